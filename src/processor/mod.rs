pub mod event_processor;
