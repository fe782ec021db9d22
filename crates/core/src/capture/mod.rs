pub mod blink;
pub mod remote;

use std::fs;
use std::path::Path;

use chrono::Local;
use tracing::{error, info};

use crate::config::Config;
use crate::domain::{capture_path, CaptureReport, SourceId};
use crate::error::Result;
use crate::prompt::Prompter;
use blink::BlinkCameras;
use remote::{OpenSsh, PiCamera};

/// Something that can produce fresh images for one or more named sources.
pub trait ImageProducer {
    /// Short label for logs, e.g. "blink" or "rpi:192.168.1.10".
    fn label(&self) -> String;

    /// Names of the sources this producer can capture from right now.
    fn sources(&mut self) -> Result<Vec<String>>;

    /// Capture one fresh image from `source` and write it to `target`.
    fn capture(&mut self, source: &str, target: &Path) -> Result<()>;
}

/// Producers for a configuration: the network cameras, then one remote device
/// per `RPI_DEVICE_<n>` group in ordinal order.
pub fn producers_for(config: &Config, prompter: Box<dyn Prompter>) -> Vec<Box<dyn ImageProducer>> {
    let mut producers: Vec<Box<dyn ImageProducer>> = vec![Box::new(BlinkCameras::new(
        config.camera_credentials.clone(),
        prompter,
    ))];
    for device in &config.devices {
        producers.push(Box::new(PiCamera::new(device.clone(), OpenSsh)));
    }
    producers
}

/// Capture one image from every source of every producer into
/// `<root>/<source_id>/<YYYYMMDD_HHMMSS>.jpg`.
///
/// Sources are captured one at a time. A failing source or producer is logged
/// and counted; the rest of the pass continues.
pub fn capture_all(root: &Path, producers: &mut [Box<dyn ImageProducer>]) -> Result<CaptureReport> {
    fs::create_dir_all(root)?;
    let mut report = CaptureReport::default();

    for producer in producers.iter_mut() {
        let label = producer.label();
        let sources = match producer.sources() {
            Ok(sources) => sources,
            Err(e) => {
                error!(producer = %label, "Failed to list sources: {e}");
                report.failed += 1;
                continue;
            }
        };
        info!(producer = %label, count = sources.len(), "Collecting images");

        for name in sources {
            let source = SourceId::new(&name);
            let target = capture_path(root, &source, Local::now().naive_local());
            match capture_one(producer.as_mut(), &name, &target) {
                Ok(()) => {
                    info!(producer = %label, %source, path = %target.display(), "Image saved");
                    report.captured += 1;
                }
                Err(e) => {
                    error!(producer = %label, %source, "Capture failed: {e}");
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

fn capture_one(producer: &mut dyn ImageProducer, name: &str, target: &Path) -> Result<()> {
    if let Some(dir) = target.parent() {
        if !dir.exists() {
            info!(path = %dir.display(), "Creating source folder");
        }
        fs::create_dir_all(dir)?;
    }
    producer.capture(name, target)
}
