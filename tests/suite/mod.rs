mod cli;
mod persistence;
mod properties;
mod scenarios;
