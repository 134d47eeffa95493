// tests/integration/main.rs

mod compile_run;
mod plan_file;
