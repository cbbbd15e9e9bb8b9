// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use bytemuck::Pod;
use scop_render::{
    AttributeFormat, BindingKind, DescriptorSchema, FaceCulling, Lifecycle, PolygonMode,
    RenderError, ShaderStages, VertexLayout, MAX_FRAMES_IN_FLIGHT,
};
use tracing::debug;

use crate::texture::TextureManager;
use crate::utils::{self, GpuBuffer};
use crate::VkError;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const ENTRY_POINT: &CStr = c"main";

/// Where SPIR-V for one stage comes from.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    Path(PathBuf),
    Bytes(&'static [u8]),
}

impl ShaderSource {
    pub fn load(&self) -> Result<Vec<u32>> {
        match self {
            Self::Path(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("read shader {}", path.display()))?;
                parse_spirv(&bytes).with_context(|| format!("parse shader {}", path.display()))
            }
            Self::Bytes(bytes) => Ok(parse_spirv(bytes)?),
        }
    }
}

/// Checks size and magic, then reads the words in host order.
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>, VkError> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(VkError::InvalidSpirv("length is not a non-zero multiple of 4"));
    }
    let head = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if u32::from_le_bytes(head) != SPIRV_MAGIC && u32::from_be_bytes(head) != SPIRV_MAGIC {
        return Err(VkError::InvalidSpirv("bad magic number"));
    }
    read_spv(&mut Cursor::new(bytes)).map_err(|_| VkError::InvalidSpirv("unreadable word stream"))
}

/// Everything a pipeline is built from.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub layout: VertexLayout,
    pub culling: FaceCulling,
    pub polygon_mode: PolygonMode,
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
    pub schema: DescriptorSchema,
}

fn vk_format(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::Float => vk::Format::R32_SFLOAT,
        AttributeFormat::Float2 => vk::Format::R32G32_SFLOAT,
        AttributeFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

fn vk_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

fn vk_polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

/// (cull mode, front face)
fn vk_culling(culling: FaceCulling) -> (vk::CullModeFlags, vk::FrontFace) {
    match culling {
        FaceCulling::None => (vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE),
        FaceCulling::Clockwise => (vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE),
        FaceCulling::CounterClockwise => (vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE),
    }
}

fn vertex_attributes(layout: &VertexLayout) -> Vec<vk::VertexInputAttributeDescription> {
    layout
        .attributes
        .iter()
        .map(|a| vk::VertexInputAttributeDescription {
            location: a.location,
            binding: 0,
            format: vk_format(a.format),
            offset: a.offset,
        })
        .collect()
}

fn fitting_len(len: usize, size: usize) -> Result<usize, VkError> {
    if len > size {
        return Err(VkError::UniformOverflow { len, size });
    }
    Ok(len)
}

fn set_layout_bindings(schema: &DescriptorSchema) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    schema
        .bindings()
        .into_iter()
        .map(|b| vk::DescriptorSetLayoutBinding {
            binding: b.binding,
            descriptor_type: match b.kind {
                BindingKind::UniformBuffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
                BindingKind::CombinedImageSampler { .. } => {
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER
                }
            },
            descriptor_count: 1,
            stage_flags: vk_stages(b.stages),
            ..Default::default()
        })
        .collect()
}

fn descriptor_pool_sizes(schema: &DescriptorSchema, frames: usize) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes = Vec::with_capacity(2);
    if !schema.ubos().is_empty() {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: (frames * schema.ubo_count()) as u32,
        });
    }
    if !schema.images().is_empty() {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: (frames * schema.images().len()) as u32,
        });
    }
    sizes
}

struct UniformBuffer {
    buffer: GpuBuffer,
    mapped: *mut u8,
}

/// Graphics pipeline plus the uniform buffers and descriptor sets it reads.
pub struct Shader {
    schema: DescriptorSchema,
    set_layout: Lifecycle<vk::DescriptorSetLayout>,
    pipeline_layout: Lifecycle<vk::PipelineLayout>,
    pipeline: Lifecycle<vk::Pipeline>,
    uniforms: Vec<UniformBuffer>,
    descriptor_pool: Lifecycle<vk::DescriptorPool>,
    sets: Vec<vk::DescriptorSet>,
}

impl Shader {
    /// Builds the pipeline and its descriptors. Images named by the schema
    /// must already exist in `textures`. On failure nothing is left behind.
    pub fn new(
        device: &ash::Device,
        memory: &vk::PhysicalDeviceMemoryProperties,
        render_pass: vk::RenderPass,
        textures: &TextureManager,
        desc: &ShaderDesc,
    ) -> Result<Self> {
        let mut shader = Self {
            schema: desc.schema.clone(),
            set_layout: Lifecycle::Uninitialized,
            pipeline_layout: Lifecycle::Uninitialized,
            pipeline: Lifecycle::Uninitialized,
            uniforms: Vec::new(),
            descriptor_pool: Lifecycle::Uninitialized,
            sets: Vec::new(),
        };
        if let Err(e) = shader.build(device, memory, render_pass, textures, desc) {
            shader.destroy(device);
            return Err(e);
        }
        debug!(
            "shader: {} uniform buffer(s), {} descriptor set(s), {:?}/{:?}",
            shader.uniforms.len(),
            shader.sets.len(),
            desc.culling,
            desc.polygon_mode
        );
        Ok(shader)
    }

    fn build(
        &mut self,
        device: &ash::Device,
        memory: &vk::PhysicalDeviceMemoryProperties,
        render_pass: vk::RenderPass,
        textures: &TextureManager,
        desc: &ShaderDesc,
    ) -> Result<()> {
        // resolve images and validate sizes before creating anything
        let mut samplers = Vec::with_capacity(desc.schema.images().len());
        for id in desc.schema.images() {
            let image = textures
                .image(id)
                .ok_or_else(|| RenderError::UnknownImage(id.clone()))?;
            samplers.push((image.image.view, image.sampler));
        }
        if let Some(slot) = desc.schema.ubos().iter().position(|u| u.size == 0) {
            return Err(VkError::EmptyUniform(slot).into());
        }

        unsafe {
            self.create_set_layout(device)?;
            self.create_pipeline(device, render_pass, desc)?;
            self.create_uniforms(device, memory)?;
            self.create_descriptors(device, &samplers)?;
        }
        Ok(())
    }

    unsafe fn create_set_layout(&mut self, device: &ash::Device) -> Result<()> {
        let bindings = set_layout_bindings(&self.schema);
        let ci = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: bindings.len() as u32,
            p_bindings: bindings.as_ptr(),
            ..Default::default()
        };
        let layout = device
            .create_descriptor_set_layout(&ci, None)
            .context("create_descriptor_set_layout")?;
        self.set_layout
            .replace_with(layout, |old| device.destroy_descriptor_set_layout(old, None));
        Ok(())
    }

    unsafe fn create_pipeline(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        desc: &ShaderDesc,
    ) -> Result<()> {
        let set_layout = self
            .set_layout
            .live()
            .copied()
            .ok_or_else(|| anyhow!("descriptor set layout missing"))?;

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            ..Default::default()
        };
        let layout = device
            .create_pipeline_layout(&layout_info, None)
            .context("create_pipeline_layout")?;
        self.pipeline_layout
            .replace_with(layout, |old| device.destroy_pipeline_layout(old, None));

        let vs_code = desc.vertex.load().context("vertex shader")?;
        let fs_code = desc.fragment.load().context("fragment shader")?;
        let vs = create_module(device, &vs_code)?;
        let fs = match create_module(device, &fs_code) {
            Ok(m) => m,
            Err(e) => {
                device.destroy_shader_module(vs, None);
                return Err(e);
            }
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let vb = vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let va = vertex_attributes(&desc.layout);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &vb,
            vertex_attribute_description_count: va.len() as u32,
            p_vertex_attribute_descriptions: va.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };
        // viewport and scissor are set per frame so resizes keep the pipeline
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let (cull_mode, front_face) = vk_culling(desc.culling);
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk_polygon_mode(desc.polygon_mode),
            cull_mode,
            front_face,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };

        let created = device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        );
        device.destroy_shader_module(vs, None);
        device.destroy_shader_module(fs, None);

        let pipelines = created
            .map_err(|(_, err)| anyhow!("create_graphics_pipelines failed: {err:?}"))?;
        self.pipeline
            .replace_with(pipelines[0], |old| device.destroy_pipeline(old, None));
        Ok(())
    }

    /// One persistently mapped buffer per (frame slot, UBO slot).
    unsafe fn create_uniforms(
        &mut self,
        device: &ash::Device,
        memory: &vk::PhysicalDeviceMemoryProperties,
    ) -> Result<()> {
        let count = self.schema.uniform_buffer_count(MAX_FRAMES_IN_FLIGHT);
        self.uniforms.reserve(count);
        for _frame in 0..MAX_FRAMES_IN_FLIGHT {
            for ubo in self.schema.ubos() {
                let buffer = utils::create_buffer(
                    device,
                    memory,
                    ubo.size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
                .context("create uniform buffer")?;
                let mapped = match device.map_memory(buffer.memory, 0, ubo.size, vk::MemoryMapFlags::empty()) {
                    Ok(p) => p as *mut u8,
                    Err(e) => {
                        buffer.destroy(device);
                        return Err(e).context("map_memory(uniform)");
                    }
                };
                self.uniforms.push(UniformBuffer { buffer, mapped });
            }
        }
        Ok(())
    }

    unsafe fn create_descriptors(
        &mut self,
        device: &ash::Device,
        samplers: &[(vk::ImageView, vk::Sampler)],
    ) -> Result<()> {
        let sizes = descriptor_pool_sizes(&self.schema, MAX_FRAMES_IN_FLIGHT);
        if sizes.is_empty() {
            return Ok(());
        }
        let set_layout = self
            .set_layout
            .live()
            .copied()
            .ok_or_else(|| anyhow!("descriptor set layout missing"))?;

        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: MAX_FRAMES_IN_FLIGHT as u32,
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        let pool = device
            .create_descriptor_pool(&pool_ci, None)
            .context("create_descriptor_pool")?;
        self.descriptor_pool
            .replace_with(pool, |old| device.destroy_descriptor_pool(old, None));

        let layouts = vec![set_layout; MAX_FRAMES_IN_FLIGHT];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: pool,
            descriptor_set_count: layouts.len() as u32,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        self.sets = device
            .allocate_descriptor_sets(&alloc)
            .context("allocate_descriptor_sets")?;

        // infos are fully built before any write points into them
        let ubo_count = self.schema.ubo_count();
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = self
            .uniforms
            .iter()
            .map(|u| vk::DescriptorBufferInfo {
                buffer: u.buffer.buffer,
                offset: 0,
                range: u.buffer.size,
            })
            .collect();
        let image_infos: Vec<vk::DescriptorImageInfo> = samplers
            .iter()
            .map(|&(view, sampler)| vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            })
            .collect();

        let mut writes = Vec::with_capacity(self.sets.len() * self.schema.binding_count());
        for (frame, &set) in self.sets.iter().enumerate() {
            for slot in 0..ubo_count {
                writes.push(vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: slot as u32,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    p_buffer_info: &buffer_infos[self.schema.buffer_index(frame, slot)],
                    ..Default::default()
                });
            }
            for (i, info) in image_infos.iter().enumerate() {
                writes.push(vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: (ubo_count + i) as u32,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    p_image_info: info,
                    ..Default::default()
                });
            }
        }
        device.update_descriptor_sets(&writes, &[]);
        Ok(())
    }

    /// Copies `data` into the mapped buffer of (`frame`, `slot`). Data larger
    /// than the slot is refused; nothing is written.
    ///
    /// Indices are the caller's responsibility; out-of-range values panic.
    pub fn update_ubo(&mut self, frame: usize, slot: usize, data: &[u8]) -> Result<(), VkError> {
        debug_assert!(slot < self.schema.ubo_count());
        let ubo = &self.uniforms[self.schema.buffer_index(frame, slot)];
        let len = fitting_len(data.len(), ubo.buffer.size as usize)?;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ubo.mapped, len) };
        Ok(())
    }

    pub fn update_ubo_pod<T: Pod>(&mut self, frame: usize, slot: usize, value: &T) -> Result<(), VkError> {
        self.update_ubo(frame, slot, bytemuck::bytes_of(value))
    }

    pub fn pipeline(&self) -> Option<vk::Pipeline> {
        self.pipeline.live().copied()
    }

    pub fn pipeline_layout(&self) -> Option<vk::PipelineLayout> {
        self.pipeline_layout.live().copied()
    }

    pub fn descriptor_set(&self, frame: usize) -> Option<vk::DescriptorSet> {
        self.sets.get(frame).copied()
    }

    pub fn schema(&self) -> &DescriptorSchema {
        &self.schema
    }

    pub fn uniform_buffer_count(&self) -> usize {
        self.uniforms.len()
    }

    pub fn descriptor_set_count(&self) -> usize {
        self.sets.len()
    }

    /// STRICT TEARDOWN ORDER: uniform buffers -> descriptor pool -> set layout
    /// -> pipeline -> pipeline layout. Idempotent.
    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for ubo in self.uniforms.drain(..) {
                device.unmap_memory(ubo.buffer.memory);
                ubo.buffer.destroy(device);
            }
            if let Some(pool) = self.descriptor_pool.take_live() {
                // sets go with the pool
                device.destroy_descriptor_pool(pool, None);
                self.sets.clear();
            }
            if let Some(layout) = self.set_layout.take_live() {
                device.destroy_descriptor_set_layout(layout, None);
            }
            if let Some(pipeline) = self.pipeline.take_live() {
                device.destroy_pipeline(pipeline, None);
            }
            if let Some(layout) = self.pipeline_layout.take_live() {
                device.destroy_pipeline_layout(layout, None);
            }
        }
    }
}

unsafe fn create_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    device
        .create_shader_module(&ci, None)
        .context("create_shader_module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scop_render::{Vertex, VertexPos, VertexType};

    fn spirv_header() -> Vec<u8> {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        bytes
    }

    #[test]
    fn spirv_words_are_read() {
        let words = parse_spirv(&spirv_header()).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn spirv_rejects_bad_length_and_magic() {
        assert!(matches!(parse_spirv(&[]), Err(VkError::InvalidSpirv(_))));
        assert!(matches!(parse_spirv(&[1, 2, 3]), Err(VkError::InvalidSpirv(_))));
        assert!(matches!(parse_spirv(&[0; 8]), Err(VkError::InvalidSpirv(_))));
    }

    #[test]
    fn built_in_shaders_parse() {
        assert!(parse_spirv(crate::MESH_VERT_SPV).is_ok());
        assert!(parse_spirv(crate::MESH_FRAG_SPV).is_ok());
    }

    #[test]
    fn missing_shader_file_is_an_error() {
        let src = ShaderSource::Path(PathBuf::from("/definitely/not/here.spv"));
        assert!(src.load().is_err());
    }

    #[test]
    fn one_ubo_one_image_over_two_frames() {
        let schema = DescriptorSchema::new()
            .with_ubo(192, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
            .with_image("duckSpaceship");

        assert_eq!(schema.uniform_buffer_count(MAX_FRAMES_IN_FLIGHT), 2);

        let bindings = set_layout_bindings(&schema);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(
            bindings[0].stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(
            bindings[1].descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);

        let sizes = descriptor_pool_sizes(&schema, MAX_FRAMES_IN_FLIGHT);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].descriptor_count, 2);
        assert_eq!(sizes[1].descriptor_count, 2);
    }

    #[test]
    fn empty_schema_needs_no_pool() {
        assert!(descriptor_pool_sizes(&DescriptorSchema::new(), 2).is_empty());
    }

    #[test]
    fn vertex_layout_maps_to_attributes() {
        let attrs = vertex_attributes(&Vertex::layout());
        let got: Vec<_> = attrs.iter().map(|a| (a.location, a.format, a.offset)).collect();
        assert_eq!(
            got,
            vec![
                (0, vk::Format::R32G32B32_SFLOAT, 0),
                (1, vk::Format::R32G32B32_SFLOAT, 12),
                (2, vk::Format::R32G32_SFLOAT, 24),
            ]
        );
    }

    #[test]
    fn position_normal_layout_maps_to_attributes() {
        let attrs = vertex_attributes(&VertexPos::layout());
        let got: Vec<_> = attrs.iter().map(|a| (a.location, a.format, a.offset)).collect();
        assert_eq!(
            got,
            vec![
                (0, vk::Format::R32G32B32_SFLOAT, 0),
                (1, vk::Format::R32G32B32_SFLOAT, 12),
            ]
        );
        assert!(attrs.iter().all(|a| a.binding == 0));
    }

    #[test]
    fn oversized_uniform_write_is_refused() {
        assert_eq!(fitting_len(208, 208).unwrap(), 208);
        assert_eq!(fitting_len(64, 208).unwrap(), 64);
        assert!(matches!(
            fitting_len(209, 208),
            Err(VkError::UniformOverflow { len: 209, size: 208 })
        ));
    }

    #[test]
    fn culling_modes() {
        assert_eq!(vk_culling(FaceCulling::None).0, vk::CullModeFlags::NONE);
        assert_eq!(
            vk_culling(FaceCulling::Clockwise),
            (vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE)
        );
        assert_eq!(
            vk_culling(FaceCulling::CounterClockwise),
            (vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
        );
        assert_eq!(vk_polygon_mode(PolygonMode::Line), vk::PolygonMode::LINE);
    }
}
