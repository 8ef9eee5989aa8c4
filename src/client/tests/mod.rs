use super::test_helpers::*;
use super::*;
use crate::error::TransportError;
use crate::request::{
    AnalyzeOptions, GenerateMidiOptions, JobOptions, JobRequest, StemSplitOptions,
};
use crate::types::{ArtifactRef, Event, JobId, JobOutcome, JobState, Operation, ResultBundle};
use std::sync::Arc;
use std::time::Duration;


/// Analysis request for `file`
fn analyze(file: &std::path::Path) -> JobRequest {
    JobRequest::new(file, JobOptions::Analyze(AnalyzeOptions::default()))
}

/// Drain every event currently buffered for `rx`
fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
