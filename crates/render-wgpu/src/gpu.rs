use crate::shaders;
use afterglow_common::{Color, Viewport};
use afterglow_render::{
    BloomFilter, CompositeShader, FrameImage, MAX_BLUR_TAPS, MAX_TARGET_DIMENSION, RenderBackend,
    RenderError, ScenePass,
};
use afterglow_scene::{Camera, Scene};
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex};

/// Format of every intermediate target.
const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Format of the presented image.
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Blur weights are packed four to a `vec4` in the uniform block.
const WEIGHT_VEC4S: usize = (MAX_BLUR_TAPS + 1).div_ceil(4);

const INITIAL_VERTEX_CAPACITY: u64 = 4096;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct BlurUniforms {
    direction: [i32; 2],
    half_width: u32,
    _pad: u32,
    weights: [[f32; 4]; WEIGHT_VEC4S],
}

impl BlurUniforms {
    fn new(direction: [i32; 2], weights: &[f32]) -> Self {
        let taps = weights.len().clamp(1, MAX_BLUR_TAPS + 1);
        let mut packed = [[0.0; 4]; WEIGHT_VEC4S];
        for (i, w) in weights.iter().take(taps).enumerate() {
            packed[i / 4][i % 4] = *w;
        }
        Self {
            direction,
            half_width: (taps - 1) as u32,
            _pad: 0,
            weights: packed,
        }
    }
}

/// World-space vertex with its material resolved.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct SceneVertex {
    position: [f32; 3],
    normal: [f32; 3],
    color: [f32; 4],
    /// rgb = emissive, a = 1.0 when unlit.
    emissive: [f32; 4],
}

/// Expand every mesh of `scene` into world-space triangle vertices.
fn flatten(scene: &Scene, out: &mut Vec<SceneVertex>) -> Result<(), RenderError> {
    let mut failure = None;
    scene.traverse(|node, world| {
        if failure.is_some() {
            return;
        }
        let Some(mesh) = node.mesh() else {
            return;
        };
        let geometry = &mesh.geometry;
        if let Err(source) = geometry.validate() {
            failure = Some(RenderError::InvalidGeometry {
                node: node.id(),
                source,
            });
            return;
        }
        let material = &mesh.material;
        let e = material.emissive;
        let emissive = [e.r, e.g, e.b, if material.unlit { 1.0 } else { 0.0 }];
        let normal_matrix = world.inverse().transpose();
        out.extend(geometry.indices.iter().map(|&i| {
            let i = i as usize;
            SceneVertex {
                position: world.transform_point3(geometry.positions[i]).to_array(),
                normal: normal_matrix
                    .transform_vector3(geometry.normals[i])
                    .normalize_or_zero()
                    .to_array(),
                color: material.color.to_array(),
                emissive,
            }
        }));
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn clear_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

/// A uniform buffer with the bind group that exposes it.
struct UniformSlot {
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
}

impl UniformSlot {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str, size: u64) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, group }
    }

    fn write<T: Pod>(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }
}

struct ColorTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl ColorTarget {
    fn new(
        device: &wgpu::Device,
        label: &str,
        viewport: Viewport,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(viewport),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self { texture, view }
    }
}

fn extent(viewport: Viewport) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: viewport.width,
        height: viewport.height,
        depth_or_array_layers: 1,
    }
}

/// Every per-viewport resource, replaced as a unit.
struct GpuTargets {
    viewport: Viewport,
    bloom: ColorTarget,
    scratch: ColorTarget,
    blur: ColorTarget,
    base: ColorTarget,
    composite: ColorTarget,
    output: ColorTarget,
    depth: wgpu::TextureView,
    bloom_read: wgpu::BindGroup,
    scratch_read: wgpu::BindGroup,
    blur_read: wgpu::BindGroup,
    composite_read: wgpu::BindGroup,
    composite_inputs: wgpu::BindGroup,
}

/// Bytes reserved on the device for one set of targets.
fn target_bytes(viewport: Viewport) -> usize {
    // five Rgba16Float planes, one Rgba8Unorm, one Depth32Float
    viewport.pixel_count().saturating_mul(5 * 8 + 4 + 4)
}

/// GPU implementation of [`RenderBackend`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<Mutex<Option<String>>>,

    scene_pipeline: wgpu::RenderPipeline,
    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    present_pipeline: wgpu::RenderPipeline,

    single_texture_layout: wgpu::BindGroupLayout,
    pair_texture_layout: wgpu::BindGroupLayout,

    camera: UniformSlot,
    threshold: UniformSlot,
    // one buffer per direction: both passes are recorded before submit
    blur_horizontal: UniformSlot,
    blur_vertical: UniformSlot,
    composite: UniformSlot,
    present: UniformSlot,

    vertex_buffer: wgpu::Buffer,
    vertex_capacity: u64,
    staging: Vec<SceneVertex>,

    targets: Option<GpuTargets>,
    presented_count: u64,
}

fn texture_layout(device: &wgpu::Device, label: &str, count: u32) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..count)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn uniform_layout(device: &wgpu::Device, label: &str, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: String,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: Default::default(),
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn scene_pipeline(device: &wgpu::Device, camera_layout: &wgpu::BindGroupLayout) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[camera_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SceneVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x3,
                    2 => Float32x4,
                    3 => Float32x4,
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn run_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    target: &wgpu::TextureView,
    groups: [&wgpu::BindGroup; 2],
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
    pass.set_pipeline(pipeline);
    for (index, group) in groups.into_iter().enumerate() {
        pass.set_bind_group(index as u32, group, &[]);
    }
    pass.draw(0..3, 0..1);
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let lost = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::error!(?reason, %message, "GPU device lost");
            if let Ok(mut slot) = flag.lock() {
                *slot = Some(message);
            }
        });

        let single_texture_layout = texture_layout(&device, "single_texture_layout", 1);
        let pair_texture_layout = texture_layout(&device, "pair_texture_layout", 2);
        let camera_layout = uniform_layout(&device, "camera_layout", wgpu::ShaderStages::VERTEX);
        let post_layout = uniform_layout(&device, "post_uniform_layout", wgpu::ShaderStages::FRAGMENT);

        let scene_pipeline = scene_pipeline(&device, &camera_layout);
        let threshold_pipeline = fullscreen_pipeline(
            &device,
            "threshold_pipeline",
            shaders::threshold_shader(),
            &[&single_texture_layout, &post_layout],
            HDR_FORMAT,
        );
        let blur_pipeline = fullscreen_pipeline(
            &device,
            "blur_pipeline",
            shaders::blur_shader(),
            &[&single_texture_layout, &post_layout],
            HDR_FORMAT,
        );
        let composite_pipeline = fullscreen_pipeline(
            &device,
            "composite_pipeline",
            shaders::composite_shader(),
            &[&pair_texture_layout, &post_layout],
            HDR_FORMAT,
        );
        let present_pipeline = fullscreen_pipeline(
            &device,
            "present_pipeline",
            shaders::present_shader(),
            &[&single_texture_layout, &post_layout],
            OUTPUT_FORMAT,
        );

        let vec4 = std::mem::size_of::<[f32; 4]>() as u64;
        let blur_size = std::mem::size_of::<BlurUniforms>() as u64;
        let camera = UniformSlot::new(
            &device,
            &camera_layout,
            "camera_uniforms",
            std::mem::size_of::<CameraUniforms>() as u64,
        );
        let threshold = UniformSlot::new(&device, &post_layout, "threshold_uniforms", vec4);
        let blur_horizontal = UniformSlot::new(&device, &post_layout, "blur_h_uniforms", blur_size);
        let blur_vertical = UniformSlot::new(&device, &post_layout, "blur_v_uniforms", blur_size);
        let composite = UniformSlot::new(&device, &post_layout, "composite_uniforms", vec4);
        let present = UniformSlot::new(&device, &post_layout, "present_uniforms", vec4);

        let vertex_buffer = Self::create_vertex_buffer(&device, INITIAL_VERTEX_CAPACITY);

        Self {
            device,
            queue,
            lost,
            scene_pipeline,
            threshold_pipeline,
            blur_pipeline,
            composite_pipeline,
            present_pipeline,
            single_texture_layout,
            pair_texture_layout,
            camera,
            threshold,
            blur_horizontal,
            blur_vertical,
            composite,
            present,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            staging: Vec::new(),
            targets: None,
            presented_count: 0,
        }
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_vertex_buffer"),
            size: capacity * std::mem::size_of::<SceneVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.targets.as_ref().map(|t| t.viewport)
    }

    pub fn presented_count(&self) -> u64 {
        self.presented_count
    }

    fn check_device(&self) -> Result<(), RenderError> {
        let message = self.lost.lock().ok().and_then(|slot| slot.clone());
        match message {
            Some(message) => Err(RenderError::DeviceLost(message)),
            None => Ok(()),
        }
    }

    fn targets(&self) -> Result<&GpuTargets, RenderError> {
        self.check_device()?;
        self.targets.as_ref().ok_or(RenderError::TargetsMissing)
    }

    fn read_group(&self, label: &str, target: &ColorTarget) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_texture_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&target.view),
            }],
        })
    }

    fn create_targets(&self, viewport: Viewport) -> GpuTargets {
        let hdr_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let hdr = |label| ColorTarget::new(&self.device, label, viewport, HDR_FORMAT, hdr_usage);
        let bloom = hdr("bloom_target");
        let scratch = hdr("blur_scratch_target");
        let blur = hdr("blur_target");
        let base = hdr("base_target");
        let composite = hdr("composite_target");
        let output = ColorTarget::new(
            &self.device,
            "output_target",
            viewport,
            OUTPUT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = self
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("depth_target"),
                size: extent(viewport),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&Default::default());

        let composite_inputs = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_inputs"),
            layout: &self.pair_texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&base.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&blur.view),
                },
            ],
        });

        GpuTargets {
            viewport,
            bloom_read: self.read_group("bloom_read", &bloom),
            scratch_read: self.read_group("scratch_read", &scratch),
            blur_read: self.read_group("blur_read", &blur),
            composite_read: self.read_group("composite_read", &composite),
            composite_inputs,
            bloom,
            scratch,
            blur,
            base,
            composite,
            output,
            depth,
        }
    }

    fn ensure_vertex_capacity(&mut self, needed: u64) {
        if needed <= self.vertex_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        tracing::debug!(capacity, "growing scene vertex buffer");
        self.vertex_buffer = Self::create_vertex_buffer(&self.device, capacity);
        self.vertex_capacity = capacity;
    }

    /// Copy the presented image back to the CPU.
    pub fn read_presented(&self) -> Result<FrameImage, RenderError> {
        let targets = self.targets()?;
        let Viewport { width, height } = targets.viewport;
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent(targets.viewport),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| RenderError::DeviceLost("readback never completed".into()))?
            .map_err(|e| RenderError::DeviceLost(e.to_string()))?;

        let mut data = Vec::with_capacity(unpadded as usize * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                data.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        Ok(FrameImage {
            width,
            height,
            data,
        })
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn acquire_targets(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.check_device()?;
        if self.viewport() == Some(viewport) {
            return Ok(());
        }
        if viewport.is_empty() {
            return Err(RenderError::EmptyViewport(viewport));
        }
        let max = self
            .device
            .limits()
            .max_texture_dimension_2d
            .min(MAX_TARGET_DIMENSION);
        if viewport.width > max || viewport.height > max {
            return Err(RenderError::ViewportTooLarge { viewport, max });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let targets = self.create_targets(viewport);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::warn!(%viewport, error = %err, "GPU target allocation failed");
            return Err(RenderError::Allocation {
                bytes: target_bytes(viewport),
            });
        }
        tracing::debug!(%viewport, bytes = target_bytes(viewport), "gpu targets allocated");
        self.targets = Some(targets);
        Ok(())
    }

    fn has_targets(&self) -> bool {
        self.targets.is_some()
    }

    fn draw_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        pass: ScenePass,
    ) -> Result<(), RenderError> {
        self.targets()?;
        let mut staging = std::mem::take(&mut self.staging);
        staging.clear();
        let flattened = flatten(scene, &mut staging);
        if flattened.is_ok() {
            self.ensure_vertex_capacity(staging.len() as u64);
        }
        self.staging = staging;
        flattened?;

        let targets = self.targets()?;
        let (target, clear) = match pass {
            ScenePass::Bloom => (&targets.bloom, Color::BLACK),
            ScenePass::Base => (&targets.base, scene.background),
        };

        self.camera.write(
            &self.queue,
            &CameraUniforms {
                view_proj: camera.view_projection().to_cols_array_2d(),
            },
        );
        if !self.staging.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.staging));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match pass {
                    ScenePass::Bloom => "bloom_scene_pass",
                    ScenePass::Base => "base_scene_pass",
                }),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(clear)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            if !self.staging.is_empty() {
                let bytes = (self.staging.len() * std::mem::size_of::<SceneVertex>()) as u64;
                rpass.set_pipeline(&self.scene_pipeline);
                rpass.set_bind_group(0, &self.camera.group, &[]);
                rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..bytes));
                rpass.draw(0..self.staging.len() as u32, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(?pass, vertices = self.staging.len(), "scene drawn");
        Ok(())
    }

    fn bloom_filter(&mut self, filter: &BloomFilter) -> Result<(), RenderError> {
        let targets = self.targets()?;
        self.threshold.write(
            &self.queue,
            &[filter.bright.threshold, filter.bright.strength, 0.0, 0.0],
        );
        let weights = filter.blur.weights();
        self.blur_horizontal
            .write(&self.queue, &BlurUniforms::new([1, 0], weights));
        self.blur_vertical
            .write(&self.queue, &BlurUniforms::new([0, 1], weights));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("bloom_filter_encoder"),
            });
        run_fullscreen(
            &mut encoder,
            "threshold_pass",
            &self.threshold_pipeline,
            &targets.blur.view,
            [&targets.bloom_read, &self.threshold.group],
        );
        run_fullscreen(
            &mut encoder,
            "blur_horizontal_pass",
            &self.blur_pipeline,
            &targets.scratch.view,
            [&targets.blur_read, &self.blur_horizontal.group],
        );
        run_fullscreen(
            &mut encoder,
            "blur_vertical_pass",
            &self.blur_pipeline,
            &targets.blur.view,
            [&targets.scratch_read, &self.blur_vertical.group],
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn composite(&mut self, shader: &CompositeShader) -> Result<(), RenderError> {
        let targets = self.targets()?;
        self.composite
            .write(&self.queue, &[shader.bloom_factor, 0.0, 0.0, 0.0]);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite_encoder"),
            });
        run_fullscreen(
            &mut encoder,
            "composite_pass",
            &self.composite_pipeline,
            &targets.composite.view,
            [&targets.composite_inputs, &self.composite.group],
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self, exposure: f32) -> Result<(), RenderError> {
        let targets = self.targets()?;
        self.present.write(&self.queue, &[exposure, 0.0, 0.0, 0.0]);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present_encoder"),
            });
        run_fullscreen(
            &mut encoder,
            "present_pass",
            &self.present_pipeline,
            &targets.output.view,
            [&targets.composite_read, &self.present.group],
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        self.presented_count += 1;
        Ok(())
    }
}
