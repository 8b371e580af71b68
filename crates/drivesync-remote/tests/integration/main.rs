//! Integration tests for drivesync-remote
//!
//! Uses wiremock to simulate the Drive v3 API and verifies metadata calls,
//! error mapping, resumable uploads and streamed downloads.

mod common;

mod test_files;
mod test_upload;
