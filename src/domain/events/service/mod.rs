pub mod event_stream_service;
