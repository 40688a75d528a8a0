//! Shader modules and the graphics pipeline
//!
//! Shaders are precompiled SPIR-V loaded from disk as opaque bytes. The pipeline
//! bakes in the viewport for one swapchain extent, so it is rebuilt with the rest of
//! the swapchain bundle.

use ash::{vk, Device};
use std::io::Cursor;
use std::path::Path;

use super::error::{VulkanError, VulkanResult};
use crate::render::vertex::Vertex;

const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Decode SPIR-V bytes into words, handling alignment and endianness
pub fn spirv_words(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| VulkanError::PipelineCreationFailed(format!("Invalid SPIR-V: {e}")))
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        let code = spirv_words(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(|e| VulkanError::PipelineCreationFailed(format!("Shader module: {e:?}")))?;

        Ok(Self { device, module })
    }

    /// Load shader from a SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::PipelineCreationFailed(format!(
                "Failed to read shader {}: {e}",
                path.display()
            ))
        })?;
        Self::from_bytes(device, &bytes)
    }

    /// Shader stage description using the `main` entry point
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline and its layout, destroyed pipeline first
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create the pipeline that draws [`Vertex`] triangles into `render_pass`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| VulkanError::PipelineCreationFailed(format!("Pipeline layout: {e:?}")))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match created {
            Ok(pipelines) if !pipelines.is_empty() => pipelines[0],
            Ok(_) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::PipelineCreationFailed(
                    "Driver returned no pipeline".to_string(),
                ));
            }
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::PipelineCreationFailed(format!(
                    "Graphics pipeline: {e:?}"
                )));
            }
        };

        log::debug!("Created graphics pipeline for {}x{}", extent.width, extent.height);
        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Create the pipeline from the two SPIR-V files on disk
    pub fn from_shader_files(
        device: &Device,
        render_pass: vk::RenderPass,
        vertex_path: &str,
        fragment_path: &str,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;
        Self::new(
            device.clone(),
            render_pass,
            &vertex_shader,
            &fragment_shader,
            extent,
        )
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spirv_words_little_endian() {
        let mut bytes = 0x0723_0203_u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000_u32.to_le_bytes());
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);
    }

    #[test]
    fn test_spirv_words_rejects_truncated_input() {
        let result = spirv_words(&[0x03, 0x02, 0x23]);
        assert!(matches!(result, Err(VulkanError::PipelineCreationFailed(_))));
    }
}
