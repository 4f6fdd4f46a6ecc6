//! Overlay compositor: blends the active overlay set onto a frame.
//!
//! Sinks with persistent overlay surfaces get the begin/blend/end sequence
//! and do the pixel work themselves. For every other sink the compositor
//! decodes and blends each layer into the frame's planes on the CPU, using
//! nearest-neighbour scaling.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::{trace, warn};
use vidout_core::overlay_limits::MAX_OPACITY;
use vidout_core::{FrameImage, IRect, PixelFormat, Result, VideoOutError};

use crate::argb::ArgbLayer;
use crate::layer::{OverlayLayer, OverlaySource};
use crate::manager::OverlayHandle;

/// Sink-side persistent overlay support.
///
/// Called as `overlay_begin` once, `overlay_blend` once per visible layer in
/// handle order, then `overlay_end` once.
pub trait OverlayTarget {
    /// `changed` is true if anything differs from the previous pass.
    fn overlay_begin(&mut self, frame: &mut FrameImage, changed: bool);
    fn overlay_blend(&mut self, frame: &mut FrameImage, layer: &OverlayLayer);
    fn overlay_end(&mut self, frame: &mut FrameImage);
}

/// Outcome of one compositing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlendStats {
    pub layers_blended: usize,
    pub layers_skipped: usize,
    /// ARGB pixels re-sampled into the scaled caches this pass.
    pub argb_pixels_resampled: u64,
}

/// How a layer lands on a particular frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    /// Layer origin in frame pixels (unclipped).
    origin_x: i32,
    origin_y: i32,
    /// Frame pixels covered by the layer, clipped to the frame.
    dest: IRect,
    /// Frame-to-layer scale: `src = (dst - origin) * num / den`.
    num_x: i64,
    den_x: i64,
    num_y: i64,
    den_y: i64,
    layer_width: i32,
    layer_height: i32,
}

impl Placement {
    fn compute(frame: &FrameImage, layer: &OverlayLayer) -> Option<Self> {
        let bounds = IRect::new(0, 0, frame.width as i32, frame.height as i32);
        let (lw, lh) = (layer.width as i32, layer.height as i32);

        if layer.unscaled {
            let (ox, oy) = frame.overlay_offset;
            let rect = IRect::new(layer.x + ox, layer.y + oy, lw, lh);
            return Some(Self {
                origin_x: rect.x,
                origin_y: rect.y,
                dest: rect.intersect(bounds)?,
                num_x: 1,
                den_x: 1,
                num_y: 1,
                den_y: 1,
                layer_width: lw,
                layer_height: lh,
            });
        }

        let display = frame.crop.display_rect(frame.width, frame.height);
        if display.is_empty() {
            return None;
        }
        let ext_w = if layer.extent_width == 0 {
            display.width as i64
        } else {
            layer.extent_width as i64
        };
        let ext_h = if layer.extent_height == 0 {
            display.height as i64
        } else {
            layer.extent_height as i64
        };
        let (dw, dh) = (display.width as i64, display.height as i64);

        let x0 = display.x as i64 + layer.x as i64 * dw / ext_w;
        let y0 = display.y as i64 + layer.y as i64 * dh / ext_h;
        let x1 = display.x as i64 + (layer.x as i64 + lw as i64) * dw / ext_w;
        let y1 = display.y as i64 + (layer.y as i64 + lh as i64) * dh / ext_h;
        let rect = IRect::from_corners(x0 as i32, y0 as i32, x1 as i32, y1 as i32);

        Some(Self {
            origin_x: x0 as i32,
            origin_y: y0 as i32,
            dest: rect.intersect(display)?.intersect(bounds)?,
            num_x: ext_w,
            den_x: dw,
            num_y: ext_h,
            den_y: dh,
            layer_width: lw,
            layer_height: lh,
        })
    }

    /// Layer-local column sampled by frame column `dx` (pixel centres).
    #[inline]
    fn src_x(&self, dx: i32) -> i32 {
        let d = (dx - self.origin_x) as i64;
        (((2 * d + 1) * self.num_x) / (2 * self.den_x)).clamp(0, self.layer_width as i64 - 1) as i32
    }

    #[inline]
    fn src_y(&self, dy: i32) -> i32 {
        let d = (dy - self.origin_y) as i64;
        (((2 * d + 1) * self.num_y) / (2 * self.den_y)).clamp(0, self.layer_height as i64 - 1)
            as i32
    }

    /// Frame pixels whose samples fall inside layer-local `src`.
    fn dest_for_source(&self, src: IRect) -> Option<IRect> {
        let x0 = self.origin_x as i64 + src.x as i64 * self.den_x / self.num_x;
        let y0 = self.origin_y as i64 + src.y as i64 * self.den_y / self.num_y;
        // one pixel of slack for rounding in the centre sampling
        let x1 = self.origin_x as i64 + src.right() as i64 * self.den_x / self.num_x + 1;
        let y1 = self.origin_y as i64 + src.bottom() as i64 * self.den_y / self.num_y + 1;
        IRect::from_corners(x0 as i32 - 1, y0 as i32 - 1, x1 as i32, y1 as i32).intersect(self.dest)
    }
}

/// Scaled copy of an ARGB surface for one overlay handle.
struct ArgbCache {
    surface: Weak<ArgbLayer>,
    placement: Placement,
    pixels: Vec<u32>,
}

impl ArgbCache {
    fn resample(&mut self, src: &[u32], src_stride: u32, area: IRect) -> u64 {
        let p = self.placement;
        let stride = p.dest.width as usize;
        for dy in area.y..area.bottom() {
            let sy = p.src_y(dy) as usize;
            let row = (dy - p.dest.y) as usize * stride;
            for dx in area.x..area.right() {
                let sx = p.src_x(dx) as usize;
                self.pixels[row + (dx - p.dest.x) as usize] = src[sy * src_stride as usize + sx];
            }
        }
        area.area() as u64
    }
}

/// Sequences and blends overlay layers onto frames.
#[derive(Default)]
pub struct OverlayCompositor {
    argb_cache: HashMap<OverlayHandle, ArgbCache>,
}

impl OverlayCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blend `layers` onto `frame`.
    ///
    /// Layers are processed in ascending handle order whatever order they
    /// arrive in. With a `target`, the pixel work is delegated to it.
    pub fn blend(
        &mut self,
        frame: &mut FrameImage,
        layers: &[(OverlayHandle, &OverlayLayer)],
        changed: bool,
        target: Option<&mut dyn OverlayTarget>,
    ) -> BlendStats {
        let mut ordered: Vec<(OverlayHandle, &OverlayLayer)> = layers.to_vec();
        ordered.sort_by_key(|(h, _)| *h);

        let mut stats = BlendStats::default();

        if let Some(target) = target {
            target.overlay_begin(frame, changed);
            for (_, layer) in &ordered {
                target.overlay_blend(frame, layer);
                stats.layers_blended += 1;
            }
            target.overlay_end(frame);
            return stats;
        }

        self.argb_cache
            .retain(|h, _| ordered.iter().any(|(oh, _)| oh == h));

        // one dirty rect per surface per pass, shared by every handle on it
        let mut dirty: Vec<(*const ArgbLayer, Option<IRect>)> = Vec::new();

        for (handle, layer) in &ordered {
            let result = match &layer.source {
                OverlaySource::Rle(_) => blend_rle(frame, layer),
                OverlaySource::Argb(surface) => {
                    let ptr = Arc::as_ptr(surface.layer());
                    let surface_dirty = match dirty.iter().find(|(p, _)| *p == ptr) {
                        Some((_, d)) => *d,
                        None => {
                            let d = surface.take_dirty();
                            dirty.push((ptr, d));
                            d
                        }
                    };
                    self.blend_argb(frame, *handle, layer, surface.layer(), surface_dirty)
                        .map(|n| stats.argb_pixels_resampled += n)
                }
            };
            match result {
                Ok(()) => stats.layers_blended += 1,
                Err(e) => {
                    warn!("overlay {:?} not blended: {}", handle, e);
                    stats.layers_skipped += 1;
                }
            }
        }

        trace!(
            "blended {} overlays ({} skipped)",
            stats.layers_blended,
            stats.layers_skipped
        );
        stats
    }

    /// Drop cached scaled surfaces (e.g. on stream reset).
    pub fn clear_cache(&mut self) {
        self.argb_cache.clear();
    }

    fn blend_argb(
        &mut self,
        frame: &mut FrameImage,
        handle: OverlayHandle,
        layer: &OverlayLayer,
        surface: &Arc<ArgbLayer>,
        surface_dirty: Option<IRect>,
    ) -> Result<u64> {
        // the surface's dirty rect is consumed this pass, so a pass that
        // does not refresh the cache must not leave it behind
        if frame.format != PixelFormat::Rgba8 {
            self.argb_cache.remove(&handle);
            return Err(VideoOutError::Unsupported(format!(
                "ARGB overlay on {:?} frame",
                frame.format
            )));
        }
        if layer.width != surface.width() || layer.height != surface.height() {
            self.argb_cache.remove(&handle);
            return Err(VideoOutError::InvalidParameter(format!(
                "ARGB surface {}x{} does not match layer {}x{}",
                surface.width(),
                surface.height(),
                layer.width,
                layer.height
            )));
        }
        let Some(placement) = Placement::compute(frame, layer) else {
            self.argb_cache.remove(&handle);
            return Ok(0);
        };

        let reusable = self.argb_cache.get(&handle).is_some_and(|c| {
            c.placement == placement && std::ptr::eq(c.surface.as_ptr(), Arc::as_ptr(surface))
        });
        if !reusable {
            self.argb_cache.insert(
                handle,
                ArgbCache {
                    surface: Arc::downgrade(surface),
                    placement,
                    pixels: vec![0; placement.dest.area() as usize],
                },
            );
        }
        let Some(cache) = self.argb_cache.get_mut(&handle) else {
            return Ok(0);
        };

        let area = if reusable {
            surface_dirty.and_then(|d| placement.dest_for_source(d))
        } else {
            Some(placement.dest)
        };

        let width = surface.width();
        let resampled = match area {
            Some(area) => surface
                .with_pixels(|src| cache.resample(src, width, area))
                .ok_or_else(|| VideoOutError::Unsupported("ARGB surface disposed".into()))?,
            None => 0,
        };

        let dest = placement.dest;
        let stride = dest.width as usize;
        for dy in dest.y..dest.bottom() {
            let row = (dy - dest.y) as usize * stride;
            for dx in dest.x..dest.right() {
                let argb = cache.pixels[row + (dx - dest.x) as usize];
                let alpha = (argb >> 24) as u8;
                if alpha != 0 {
                    put_rgb(frame, dx, dy, argb & 0x00ff_ffff, alpha);
                }
            }
        }
        Ok(resampled)
    }
}

/// Scale a 0..=15 opacity to 0..=255.
#[inline]
fn opacity_to_alpha(opacity: u8) -> u8 {
    opacity.min(MAX_OPACITY) * 17
}

#[inline]
fn mix(dst: u8, src: u8, alpha: u8) -> u8 {
    let d = dst as i32;
    (d + (src as i32 - d) * alpha as i32 / 255) as u8
}

fn blend_rle(frame: &mut FrameImage, layer: &OverlayLayer) -> Result<()> {
    let OverlaySource::Rle(image) = &layer.source else {
        return Ok(());
    };
    let want_rgb = match frame.format {
        PixelFormat::Rgba8 => true,
        f if f.is_yuv() => false,
        f => {
            return Err(VideoOutError::Unsupported(format!(
                "software overlay blending on {:?}",
                f
            )))
        }
    };
    let palettes_match = layer.clut.is_rgb() == want_rgb
        && layer
            .highlight
            .as_ref()
            .map_or(true, |h| h.clut.is_rgb() == want_rgb);
    if !palettes_match {
        return Err(VideoOutError::Unsupported(format!(
            "palette kind does not match {:?} frame",
            frame.format
        )));
    }
    if image.width != layer.width || image.height != layer.height {
        return Err(VideoOutError::InvalidParameter(format!(
            "RLE image {}x{} does not match layer {}x{}",
            image.width, image.height, layer.width, layer.height
        )));
    }

    let indices = image.decode()?;
    let Some(p) = Placement::compute(frame, layer) else {
        return Ok(());
    };

    for dy in p.dest.y..p.dest.bottom() {
        let ly = p.src_y(dy);
        let row = ly as usize * layer.width as usize;
        for dx in p.dest.x..p.dest.right() {
            let lx = p.src_x(dx);
            let index = indices[row + lx as usize];
            let clut = layer.clut_at(lx, ly);
            let opacity = clut.opacity(index);
            if opacity == 0 {
                continue;
            }
            let alpha = opacity_to_alpha(opacity);
            if want_rgb {
                put_rgb(frame, dx, dy, clut.color(index), alpha);
            } else {
                put_yuv(frame, dx, dy, clut.color(index), alpha);
            }
        }
    }
    Ok(())
}

/// Blend `0x00RRGGBB` into an RGBA frame.
#[inline]
fn put_rgb(frame: &mut FrameImage, x: i32, y: i32, rgb: u32, alpha: u8) {
    let px = x as usize * 4;
    let row = frame.planes[0].row_mut(y as u32);
    row[px] = mix(row[px], (rgb >> 16) as u8, alpha);
    row[px + 1] = mix(row[px + 1], (rgb >> 8) as u8, alpha);
    row[px + 2] = mix(row[px + 2], rgb as u8, alpha);
    row[px + 3] = mix(row[px + 3], 0xff, alpha);
}

/// Blend `0x00YYCrCb` into a YUV frame. Chroma is written at the even
/// luma positions that own each chroma sample.
#[inline]
fn put_yuv(frame: &mut FrameImage, x: i32, y: i32, ycrcb: u32, alpha: u8) {
    let luma = (ycrcb >> 16) as u8;
    let cr = (ycrcb >> 8) as u8;
    let cb = ycrcb as u8;
    let (x, y) = (x as usize, y as u32);
    let chroma_x = x % 2 == 0;
    let chroma_y = y % 2 == 0;

    match frame.format {
        PixelFormat::Yv12 => {
            let row = frame.planes[0].row_mut(y);
            row[x] = mix(row[x], luma, alpha);
            if chroma_x && chroma_y {
                let u = frame.planes[1].row_mut(y / 2);
                u[x / 2] = mix(u[x / 2], cb, alpha);
                let v = frame.planes[2].row_mut(y / 2);
                v[x / 2] = mix(v[x / 2], cr, alpha);
            }
        }
        PixelFormat::Nv12 => {
            let row = frame.planes[0].row_mut(y);
            row[x] = mix(row[x], luma, alpha);
            if chroma_x && chroma_y {
                let uv = frame.planes[1].row_mut(y / 2);
                let i = (x / 2) * 2;
                uv[i] = mix(uv[i], cb, alpha);
                uv[i + 1] = mix(uv[i + 1], cr, alpha);
            }
        }
        PixelFormat::Yuy2 => {
            let row = frame.planes[0].row_mut(y);
            row[x * 2] = mix(row[x * 2], luma, alpha);
            if chroma_x {
                row[x * 2 + 1] = mix(row[x * 2 + 1], cb, alpha);
                if x * 2 + 3 < row.len() {
                    row[x * 2 + 3] = mix(row[x * 2 + 3], cr, alpha);
                }
            }
        }
        PixelFormat::Rgba8 | PixelFormat::Opaque(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argb::ArgbLayer;
    use crate::layer::Highlight;
    use crate::palette::Clut;
    use crate::rle::RleImage;
    use vidout_core::Crop;

    fn solid_layer(w: u32, h: u32, x: i32, y: i32, color: u32, rgb: bool) -> OverlayLayer {
        let img = RleImage::encode(w, h, &vec![1u8; (w * h) as usize]).unwrap();
        let clut = Clut::from_entries(rgb, &[(0, 0), (color, 15)]);
        OverlayLayer::rle(img, x, y, clut)
    }

    fn rgba_at(frame: &FrameImage, x: u32, y: u32) -> [u8; 4] {
        let row = frame.planes[0].row(y);
        let i = x as usize * 4;
        [row[i], row[i + 1], row[i + 2], row[i + 3]]
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl OverlayTarget for Recorder {
        fn overlay_begin(&mut self, _frame: &mut FrameImage, changed: bool) {
            self.calls.push(format!("begin({changed})"));
        }
        fn overlay_blend(&mut self, _frame: &mut FrameImage, layer: &OverlayLayer) {
            self.calls.push(format!("blend({})", layer.x));
        }
        fn overlay_end(&mut self, _frame: &mut FrameImage) {
            self.calls.push("end".into());
        }
    }

    #[test]
    fn test_persistent_target_sequence_in_handle_order() {
        let a = solid_layer(1, 1, 3, 0, 0xff_0000, true);
        let b = solid_layer(1, 1, 1, 0, 0xff_0000, true);
        let c = solid_layer(1, 1, 2, 0, 0xff_0000, true);
        let layers = [
            (OverlayHandle(3), &a),
            (OverlayHandle(1), &b),
            (OverlayHandle(2), &c),
        ];
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        let mut rec = Recorder::default();
        let stats = OverlayCompositor::new().blend(&mut frame, &layers, true, Some(&mut rec));
        assert_eq!(stats.layers_blended, 3);
        assert_eq!(
            rec.calls,
            vec!["begin(true)", "blend(1)", "blend(2)", "blend(3)", "end"]
        );
    }

    #[test]
    fn test_software_order_later_handle_wins() {
        // both cover pixel (0,0); handle 2 is blended last
        let red = solid_layer(2, 2, 0, 0, 0xff_0000, true);
        let blue = solid_layer(2, 2, 0, 0, 0x00_00ff, true);
        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Rgba8);
        let mut comp = OverlayCompositor::new();
        comp.blend(
            &mut frame,
            &[(OverlayHandle(2), &blue), (OverlayHandle(1), &red)],
            true,
            None,
        );
        assert_eq!(rgba_at(&frame, 0, 0), [0, 0, 255, 255]);
        assert_eq!(rgba_at(&frame, 3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn test_unscaled_layer_uses_output_pixels_and_offset() {
        let layer = solid_layer(2, 2, 1, 1, 0xff_ffff, true)
            .with_extent(100, 100)
            .unscaled();
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        frame.overlay_offset = (2, 0);
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(rgba_at(&frame, 3, 1), [255, 255, 255, 255]);
        assert_eq!(rgba_at(&frame, 4, 2), [255, 255, 255, 255]);
        assert_eq!(rgba_at(&frame, 1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_scaled_layer_maps_extent_into_crop_rect() {
        // extent 4x4 maps onto the 8x8 display area starting at (2, 2)
        let layer = solid_layer(2, 2, 2, 2, 0xff_ffff, true).with_extent(4, 4);
        let mut frame = FrameImage::allocate(12, 12, PixelFormat::Rgba8);
        frame.crop = Crop {
            left: 2,
            right: 2,
            top: 2,
            bottom: 2,
        };
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(rgba_at(&frame, 6, 6), [255, 255, 255, 255]);
        assert_eq!(rgba_at(&frame, 9, 9), [255, 255, 255, 255]);
        assert_eq!(rgba_at(&frame, 5, 5), [0, 0, 0, 0]);
        assert_eq!(rgba_at(&frame, 10, 10), [0, 0, 0, 0]);
    }

    #[test]
    fn test_partial_opacity_mixes() {
        let img = RleImage::encode(1, 1, &[1]).unwrap();
        let clut = Clut::from_entries(true, &[(0, 0), (0xff_ffff, 5)]);
        let layer = OverlayLayer::rle(img, 0, 0, clut).unscaled();
        let mut frame = FrameImage::allocate(1, 1, PixelFormat::Rgba8);
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        // 5/15 of the way from 0 to 255
        assert_eq!(rgba_at(&frame, 0, 0)[0], 85);
    }

    #[test]
    fn test_highlight_palette_inside_rect() {
        let img = RleImage::encode(4, 1, &[1, 1, 1, 1]).unwrap();
        let base = Clut::from_entries(true, &[(0, 0), (0x00_ff00, 15)]);
        let hili = Clut::from_entries(true, &[(0, 0), (0xff_0000, 15)]);
        let layer = OverlayLayer::rle(img, 0, 0, base)
            .unscaled()
            .with_highlight(Highlight {
                rect: IRect::new(2, 0, 2, 1),
                clut: hili,
            });
        let mut frame = FrameImage::allocate(4, 1, PixelFormat::Rgba8);
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(rgba_at(&frame, 1, 0), [0, 255, 0, 255]);
        assert_eq!(rgba_at(&frame, 2, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn test_yv12_luma_and_chroma() {
        let layer = solid_layer(2, 2, 0, 0, 0xeb_4060, false).unscaled();
        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Yv12);
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(frame.planes[0].row(1)[1], 0xeb);
        assert_eq!(frame.planes[0].row(2)[2], 0);
        assert_eq!(frame.planes[1].row(0)[0], 0x60);
        assert_eq!(frame.planes[2].row(0)[0], 0x40);
    }

    #[test]
    fn test_yuy2_chroma_positions() {
        let layer = solid_layer(2, 1, 0, 0, 0x80_2030, false).unscaled();
        let mut frame = FrameImage::allocate(4, 1, PixelFormat::Yuy2);
        OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(&frame.planes[0].row(0)[..4], &[0x80, 0x30, 0x80, 0x20]);
    }

    #[test]
    fn test_mismatched_palette_is_skipped() {
        let layer = solid_layer(2, 2, 0, 0, 0xff_0000, true);
        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Yv12);
        let stats =
            OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(stats.layers_skipped, 1);
        assert_eq!(frame.planes[0].row(0)[0], 0);
    }

    #[test]
    fn test_argb_dirty_rect_limits_resampling() {
        let surface = ArgbLayer::new(8, 8);
        surface
            .update(surface.bounds(), |px, _| px.fill(0xff11_2233))
            .unwrap();
        let layer = OverlayLayer::argb(surface.attach().unwrap(), 0, 0).unscaled();
        let mut comp = OverlayCompositor::new();

        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        let first = comp.blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(first.argb_pixels_resampled, 64);
        assert_eq!(rgba_at(&frame, 7, 7), [0x11, 0x22, 0x33, 0xff]);

        // unchanged surface: cache reused
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        let second = comp.blend(&mut frame, &[(OverlayHandle(0), &layer)], false, None);
        assert_eq!(second.argb_pixels_resampled, 0);
        assert_eq!(rgba_at(&frame, 0, 0), [0x11, 0x22, 0x33, 0xff]);

        // one pixel changed: only its neighbourhood is re-sampled
        surface
            .update(IRect::new(4, 4, 1, 1), |px, stride| {
                px[(4 * stride + 4) as usize] = 0xffff_ffff;
            })
            .unwrap();
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        let third = comp.blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert!(third.argb_pixels_resampled > 0 && third.argb_pixels_resampled < 64);
        assert_eq!(rgba_at(&frame, 4, 4), [0xff, 0xff, 0xff, 0xff]);
        assert_eq!(rgba_at(&frame, 0, 0), [0x11, 0x22, 0x33, 0xff]);
    }

    #[test]
    fn test_shared_surface_updates_every_handle() {
        let surface = ArgbLayer::new(2, 2);
        let a = OverlayLayer::argb(surface.attach().unwrap(), 0, 0).unscaled();
        let b = OverlayLayer::argb(surface.attach().unwrap(), 4, 4).unscaled();
        let mut comp = OverlayCompositor::new();
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        comp.blend(
            &mut frame,
            &[(OverlayHandle(0), &a), (OverlayHandle(1), &b)],
            true,
            None,
        );

        surface
            .update(surface.bounds(), |px, _| px.fill(0xff00_ff00))
            .unwrap();
        let mut frame = FrameImage::allocate(8, 8, PixelFormat::Rgba8);
        comp.blend(
            &mut frame,
            &[(OverlayHandle(0), &a), (OverlayHandle(1), &b)],
            true,
            None,
        );
        assert_eq!(rgba_at(&frame, 1, 1), [0, 255, 0, 255]);
        assert_eq!(rgba_at(&frame, 5, 5), [0, 255, 0, 255]);
    }

    #[test]
    fn test_argb_on_yuv_frame_is_skipped() {
        let surface = ArgbLayer::new(2, 2);
        let layer = OverlayLayer::argb(surface.attach().unwrap(), 0, 0);
        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Yv12);
        let stats =
            OverlayCompositor::new().blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(stats.layers_skipped, 1);
    }

    #[test]
    fn test_skipped_argb_pass_keeps_update_for_next_pass() {
        let surface = ArgbLayer::new(4, 4);
        let layer = OverlayLayer::argb(surface.attach().unwrap(), 0, 0).unscaled();
        let mut comp = OverlayCompositor::new();
        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Rgba8);
        comp.blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);

        surface
            .update(surface.bounds(), |px, _| px.fill(0xffff_0000))
            .unwrap();
        let mut yuv = FrameImage::allocate(4, 4, PixelFormat::Yv12);
        let skipped = comp.blend(&mut yuv, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(skipped.layers_skipped, 1);

        let mut frame = FrameImage::allocate(4, 4, PixelFormat::Rgba8);
        let stats = comp.blend(&mut frame, &[(OverlayHandle(0), &layer)], true, None);
        assert_eq!(stats.argb_pixels_resampled, 16);
        assert_eq!(rgba_at(&frame, 2, 2), [255, 0, 0, 255]);
    }

    #[test]
    fn test_full_opacity_is_fully_opaque() {
        assert_eq!(opacity_to_alpha(MAX_OPACITY), 255);
        assert_eq!(opacity_to_alpha(MAX_OPACITY + 1), 255);
        assert_eq!(opacity_to_alpha(0), 0);
    }
}
