mod concurrency;
mod replay;
mod scenarios;
mod workflows;
