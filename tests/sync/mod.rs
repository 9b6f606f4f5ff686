// Test module entry point for sync tests
// All synchronization tests organized here

mod engine_tests;
mod metadata_tests;
mod watcher_tests;
