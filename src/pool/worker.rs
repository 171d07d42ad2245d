use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::foundation::error::LoopforgeResult;
use crate::fx::{self, RasterOp};

use super::WorkerRequest;

/// Host → worker task payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FrameTask {
    /// Index the reply must echo.
    pub(crate) frame_index: u32,
    /// Bitmap width in pixels.
    pub(crate) width: u32,
    /// Bitmap height in pixels.
    pub(crate) height: u32,
    /// Straight-alpha RGBA8 bytes, `4 * width * height`.
    pub(crate) bitmap: Vec<u8>,
    /// Raster operations applied in order.
    pub(crate) operations: SmallVec<[RasterOp; 4]>,
}

/// Worker → host reply payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ProcessedStill {
    /// Echo of the task's index.
    pub(crate) frame_index: u32,
    /// Width of the encoded still.
    pub(crate) width: u32,
    /// Height of the encoded still.
    pub(crate) height: u32,
    /// Lossless PNG of the processed bitmap.
    pub(crate) png: Vec<u8>,
}

/// Message loop for one pool thread.
///
/// Each `Process` request is answered exactly once; the send is allowed to
/// fail when the requesting render already bailed out.
pub(crate) fn worker_main(rx: crossbeam_channel::Receiver<WorkerRequest>) {
    while let Ok(request) = rx.recv() {
        match request {
            WorkerRequest::Process { task, reply } => {
                let result = process_frame(task);
                let _ = reply.send(result);
            }
            WorkerRequest::Shutdown => break,
        }
    }
}

/// Apply the task's operations and encode the result as a lossless still.
pub(crate) fn process_frame(mut task: FrameTask) -> LoopforgeResult<ProcessedStill> {
    fx::apply_ops(&mut task.bitmap, task.width, task.height, &task.operations)?;
    let png = encode_png(&task.bitmap, task.width, task.height)?;
    Ok(ProcessedStill {
        frame_index: task.frame_index,
        width: task.width,
        height: task.height,
        png,
    })
}

fn encode_png(bitmap: &[u8], width: u32, height: u32) -> LoopforgeResult<Vec<u8>> {
    use image::ImageEncoder as _;

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(bitmap, width, height, image::ExtendedColorType::Rgba8)
        .context("png encode of processed frame failed")?;
    Ok(png)
}
