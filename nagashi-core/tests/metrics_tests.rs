// Copyright 2026 Nagashi Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for metrics instrumentation module.

use metrics_exporter_prometheus::PrometheusBuilder;
use nagashi_core::metrics::{
    self as nagashi_metrics, ErrorCategory, MonitorStatus, Timer, EVENTS_RECEIVED_TOTAL,
    FLUSH_DURATION_SECONDS, METRIC_PREFIX, ROWS_APPLIED_TOTAL,
};

#[test]
fn test_metric_names() {
    assert!(EVENTS_RECEIVED_TOTAL.starts_with(METRIC_PREFIX));
    assert!(EVENTS_RECEIVED_TOTAL.ends_with("_total"));
    assert!(ROWS_APPLIED_TOTAL.ends_with("_total"));
    assert!(FLUSH_DURATION_SECONDS.ends_with("_seconds"));
}

#[test]
fn test_monitor_status_values() {
    assert_eq!(MonitorStatus::Idle as u8, 0);
    assert_eq!(MonitorStatus::Preflighted as u8, 1);
    assert_eq!(MonitorStatus::Streaming as u8, 2);
    assert_eq!(MonitorStatus::Stopping as u8, 3);
    assert_eq!(MonitorStatus::Stopped as u8, 4);
}

#[test]
fn test_error_category_labels() {
    assert_eq!(ErrorCategory::Connection.as_str(), "connection_error");
    assert_eq!(ErrorCategory::Io.as_str(), "io_error");
    assert_eq!(ErrorCategory::Unknown.as_str(), "unknown_error");
}

#[test]
fn test_timer() {
    use std::thread;
    use std::time::Duration;

    let recorded = std::sync::Arc::new(std::sync::Mutex::new(None));
    let recorded_clone = recorded.clone();

    {
        let _timer = Timer::new("dirty", move |duration, label| {
            *recorded_clone.lock().unwrap() = Some((duration, label.to_string()));
        });
        thread::sleep(Duration::from_millis(10));
    }

    let (duration, label) = recorded.lock().unwrap().clone().unwrap();
    assert!(duration.as_millis() >= 10);
    assert_eq!(label, "dirty");
}

#[test]
fn test_metrics_render_through_prometheus() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        nagashi_metrics::init_metrics();
        nagashi_metrics::increment_events_received("users", "insert");
        nagashi_metrics::increment_rows_applied("users", "upsert", 3);
        nagashi_metrics::set_monitor_status(MonitorStatus::Streaming);
        nagashi_metrics::record_flush_duration(std::time::Duration::from_millis(5), "all");
    });

    let output = handle.render();
    assert!(output.contains(EVENTS_RECEIVED_TOTAL));
    assert!(output.contains("table=\"users\""));
    assert!(output.contains(ROWS_APPLIED_TOTAL));
    assert!(output.contains("nagashi_monitor_status"));
    assert!(output.contains(FLUSH_DURATION_SECONDS));
}
