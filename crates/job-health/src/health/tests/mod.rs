mod batch;
mod common;
