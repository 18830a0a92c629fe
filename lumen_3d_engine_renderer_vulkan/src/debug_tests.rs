//! Unit tests for validation message routing (no GPU required)

use super::*;
use lumen_3d_engine::lumen3d::log::{LogEntry, Logger};
use std::ffi::CString;
use std::sync::{Arc, Mutex};

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

#[test]
fn test_severity_mapping() {
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), LogSeverity::Error);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), LogSeverity::Warn);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), LogSeverity::Info);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), LogSeverity::Trace);
}

// Single test touching the global logger and counters, so no ordering issues
#[test]
fn test_callback_routes_to_engine_logger() {
    let entries = capture();
    init_debug_routing();

    let id = CString::new("VUID-test-0001").unwrap();
    let text = CString::new("image layout mismatch").unwrap();
    let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
        .message_id_name(&id)
        .message(&text);

    for _ in 0..2 {
        let result = unsafe {
            vulkan_debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }

    let result = unsafe {
        vulkan_debug_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            std::ptr::null(),
            std::ptr::null_mut(),
        )
    };
    assert_eq!(result, vk::FALSE);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, VALIDATION_SOURCE);
    assert!(captured[0].message.contains("VUID-test-0001"));
    assert!(captured[1].message.contains("[x2]"));
    drop(captured);

    let stats = validation_stats();
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.total(), 2);

    shutdown_debug_routing();
    Engine::reset_logger();
}
