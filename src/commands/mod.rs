pub mod run_worker;

pub use run_worker::handle_run;
