pub mod threaded_capture_runner;
