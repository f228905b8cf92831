// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: run a two-stream network group against a virtual device.
//!
//! An input thread and an output thread loop over acquire, fill and return
//! until the main thread shuts the manager down, then the per-stream
//! statistics are printed.
//!
//! ```bash
//! cargo run -p buffer-manager --example network_group
//! ```

use buffer_manager::{
    DeviceHandle, NetworkGroupBufferPool, NetworkGroupConfig, VirtualDevice,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const GROUP: &str = r#"
name = "yolov5m"
default_pool_size = 4

[[streams]]
name = "input0"
direction = "h2d"
frame_size = "600K"

[[streams]]
name = "output0"
direction = "d2h"
frame_size = "4K"
pool_size = 8
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing.
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let device = Arc::new(VirtualDevice::new(DeviceHandle::new(0)));
    let manager = NetworkGroupBufferPool::create(device.clone())?;
    let config = NetworkGroupConfig::from_toml(GROUP)?;
    manager.allocate_from_config(&config)?;
    println!(
        "{} streams, {} frames mapped ({} bytes)\n",
        config.streams.len(),
        device.active_mappings(),
        device.mapped_bytes(),
    );

    let workers: Vec<_> = manager
        .stream_names()
        .into_iter()
        .map(|stream| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut frames = 0u64;
                while let Ok(mut frame) = manager.acquire_buffer(&stream) {
                    frame.as_mut_slice()[0] = frames as u8;
                    if manager.return_to_pool(&stream, frame).is_err() {
                        break;
                    }
                    frames += 1;
                }
                (stream, frames)
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(200));
    manager.shutdown()?;

    for worker in workers {
        let (stream, frames) = worker.join().map_err(|_| "stream thread panicked")?;
        println!("{stream:<10} {frames:>10} frames");
    }
    println!("\n{}", manager.stats().summary());
    Ok(())
}
