use super::gpu::{GpuContext, BACKDROP_COLOR};
use crate::{Result, TunnelError};

/// Shown instead of the tunnel when the live renderer could not be set up.
/// Clears the surface to the backdrop colour every frame.
#[derive(Debug)]
pub struct StaticFallback {
    reason: String,
    frames: u64,
}

impl StaticFallback {
    pub fn new(reason: &TunnelError) -> Self {
        tracing::warn!(%reason, "live rendering unavailable, showing static backdrop");
        Self {
            reason: reason.to_string(),
            frames: 0,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Clears the surface, or does nothing when there is no GPU at all.
    pub fn render(&mut self, gpu: Option<&GpuContext>) -> Result<()> {
        let Some(gpu) = gpu else {
            return Ok(());
        };
        let Some(frame) = gpu.acquire()? else {
            return Ok(());
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fallback.encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fallback.clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(BACKDROP_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        self.frames += 1;
        Ok(())
    }
}
