use std::collections::HashMap;

use log::trace;
use wgpu::util::DeviceExt;

use crate::eye::{Eye, MaterialId, Released};
use crate::geometry::{Geometry, GeometryId, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Half-height of the visible scene in world units.
const DEFAULT_VIEW_EXTENT: f32 = 3.5;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const MORPH_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EyeUniforms {
    pub translation: [f32; 3],
    pub morph_influence: f32,
    pub scale: [f32; 3],
    pub aspect_ratio: f32,
    pub color: [f32; 3],
    pub view_extent: f32,
}

impl EyeUniforms {
    pub fn from_eye(eye: &Eye, aspect_ratio: f32) -> Self {
        let mesh = eye.mesh();
        Self {
            translation: mesh.translation(),
            morph_influence: mesh.morph_influence,
            scale: mesh.scale,
            aspect_ratio,
            color: eye.material().color,
            view_extent: DEFAULT_VIEW_EXTENT,
        }
    }
}

/// GPU copy of one geometry: rest vertices, morph positions and indices.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    morph_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("eye_vertex_buffer"),
            contents: bytemuck::cast_slice(geometry.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Without a morph target the rest pose doubles as the target.
        let morph_positions: Vec<[f32; 3]> = match geometry.morph_target() {
            Some(target) => target.positions().to_vec(),
            None => geometry.vertices().iter().map(|v| v.position).collect(),
        };
        let morph_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("eye_morph_buffer"),
            contents: bytemuck::cast_slice(&morph_positions),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("eye_index_buffer"),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            morph_buffer,
            index_buffer,
            index_count: geometry.indices().len() as u32,
        }
    }

    fn destroy(self) {
        self.vertex_buffer.destroy();
        self.morph_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Per-material uniform buffer and bind group.
struct EyeBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

pub struct EyeRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    meshes: HashMap<GeometryId, GpuMesh>,
    bindings: HashMap<MaterialId, EyeBinding>,
    depth: Option<DepthTarget>,
}

impl EyeRenderer {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("eye_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/eye.wgsl").into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("eye_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("eye_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("eye_render_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &MORPH_ATTRIBUTES,
                    },
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            meshes: HashMap::new(),
            bindings: HashMap::new(),
            depth: None,
        }
    }

    /// Upload any geometry or material the eyes mounted since the last call.
    pub fn prepare(&mut self, device: &wgpu::Device, eyes: &[&Eye]) {
        for eye in eyes {
            let geometry = eye.geometry();
            if !self.meshes.contains_key(&geometry.id()) {
                trace!("uploading geometry {:?}", geometry.id());
                self.meshes
                    .insert(geometry.id(), GpuMesh::upload(device, geometry));
            }

            let material = eye.material().id();
            if !self.bindings.contains_key(&material) {
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("eye_uniform_buffer"),
                    size: std::mem::size_of::<EyeUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("eye_bind_group"),
                    layout: &self.bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });
                self.bindings.insert(
                    material,
                    EyeBinding {
                        uniform_buffer,
                        bind_group,
                    },
                );
            }
        }
    }

    /// Free the GPU side of resources the eyes gave up.
    pub fn release(&mut self, released: &[Released]) {
        for resource in released {
            match resource {
                Released::Geometry(id) => {
                    if let Some(mesh) = self.meshes.remove(id) {
                        trace!("freeing geometry {id:?}");
                        mesh.destroy();
                    }
                }
                Released::Material(id) => {
                    if let Some(binding) = self.bindings.remove(id) {
                        binding.uniform_buffer.destroy();
                    }
                }
            }
        }
    }

    fn ensure_depth(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("eye_depth_texture"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(DepthTarget { view, size });
    }

    /// Draw `eyes` into `target`, clearing it to `bg_color` first.
    ///
    /// Eyes whose resources were not [`prepare`](Self::prepare)d are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        queue: &wgpu::Queue,
        screen_size: (u32, u32),
        eyes: &[&Eye],
        bg_color: [f32; 3],
    ) {
        self.ensure_depth(device, screen_size);
        let aspect_ratio = screen_size.0.max(1) as f32 / screen_size.1.max(1) as f32;

        for eye in eyes {
            if let Some(binding) = self.bindings.get(&eye.material().id()) {
                let uniforms = EyeUniforms::from_eye(eye, aspect_ratio);
                queue.write_buffer(&binding.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
            }
        }

        let Some(depth) = self.depth.as_ref() else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("eye_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: bg_color[0] as f64,
                        g: bg_color[1] as f64,
                        b: bg_color[2] as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        for eye in eyes {
            let (Some(mesh), Some(binding)) = (
                self.meshes.get(&eye.geometry().id()),
                self.bindings.get(&eye.material().id()),
            ) else {
                continue;
            };
            pass.set_bind_group(0, &binding.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, mesh.morph_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EyeConfig;
    use crate::state::Side;

    #[test]
    fn test_uniforms_match_wgsl_layout() {
        // Three vec3 + f32 rows.
        assert_eq!(std::mem::size_of::<EyeUniforms>(), 48);
    }

    #[test]
    fn test_uniforms_follow_eye() {
        let eye = Eye::new(Side::Right, &EyeConfig::default()).unwrap();
        let uniforms = EyeUniforms::from_eye(&eye, 16.0 / 9.0);
        assert_eq!(uniforms.translation, eye.mesh().translation());
        assert_eq!(uniforms.scale, eye.mesh().scale);
        assert_eq!(uniforms.morph_influence, 0.0);
        assert_eq!(uniforms.color, [1.0, 1.0, 1.0]);
    }
}
