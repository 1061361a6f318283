//! System-metrics state source backed by `sysinfo`.

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::System;
use tokio::sync::Mutex;

use super::snapshot::{
    KeyboardState, MouseState, StateSnapshot, StateSource, SystemMetrics, UiElement,
};

/// A [`StateSource`] that fills in system metrics (CPU, memory) from the host.
///
/// Window, application, and UI-element capture are platform concerns outside
/// this crate; this source reports those sections empty. It exists so the
/// engine has a working default source for monitoring and for environments
/// where only system-level validation rules are used.
pub struct SystemMetricsSource {
    sys: Mutex<System>,
}

impl SystemMetricsSource {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SystemMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateSource for SystemMetricsSource {
    async fn capture_snapshot(&self) -> StateSnapshot {
        let mut sys = self.sys.lock().await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        StateSnapshot {
            timestamp: Utc::now(),
            metrics: SystemMetrics {
                cpu_percent: sys.global_cpu_usage(),
                memory_used: sys.used_memory(),
                active_displays: 1,
            },
            applications: Vec::new(),
            elements: Vec::<UiElement>::new(),
            focused_app: None,
            active_window: None,
            mouse: MouseState::default(),
            keyboard: KeyboardState::default(),
        }
    }
}
