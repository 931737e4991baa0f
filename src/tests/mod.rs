mod scenarios;
mod testkit;
