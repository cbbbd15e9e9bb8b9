// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UboSlot {
    pub size: u64,
    pub stages: ShaderStages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer { slot: usize, size: u64 },
    CombinedImageSampler { image: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDesc {
    pub binding: u32,
    pub stages: ShaderStages,
    pub kind: BindingKind,
}

/// Uniform buffer slots and sampled images a shader reads, in declaration
/// order. Uniform buffers take bindings `0..U`, samplers `U..U+S`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSchema {
    ubos: Vec<UboSlot>,
    images: Vec<String>,
}

impl DescriptorSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ubo(mut self, size: u64, stages: ShaderStages) -> Self {
        self.ubos.push(UboSlot { size, stages });
        self
    }

    pub fn with_image(mut self, id: impl Into<String>) -> Self {
        self.images.push(id.into());
        self
    }

    pub fn ubos(&self) -> &[UboSlot] {
        &self.ubos
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn ubo_count(&self) -> usize {
        self.ubos.len()
    }

    pub fn binding_count(&self) -> usize {
        self.ubos.len() + self.images.len()
    }

    pub fn bindings(&self) -> Vec<BindingDesc> {
        let buffers = self.ubos.iter().enumerate().map(|(slot, ubo)| BindingDesc {
            binding: slot as u32,
            stages: ubo.stages,
            kind: BindingKind::UniformBuffer {
                slot,
                size: ubo.size,
            },
        });
        let samplers = self.images.iter().enumerate().map(|(i, id)| BindingDesc {
            binding: (self.ubos.len() + i) as u32,
            stages: ShaderStages::FRAGMENT,
            kind: BindingKind::CombinedImageSampler { image: id.clone() },
        });
        buffers.chain(samplers).collect()
    }

    /// Uniform buffers needed for `frames` frame slots.
    pub fn uniform_buffer_count(&self, frames: usize) -> usize {
        frames * self.ubos.len()
    }

    /// Flat index of the buffer backing `slot` in frame `frame`.
    pub fn buffer_index(&self, frame: usize, slot: usize) -> usize {
        frame * self.ubos.len() + slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_ubo_one_texture_two_frames() {
        let schema = DescriptorSchema::new()
            .with_ubo(192, ShaderStages::VERTEX)
            .with_image("duckSpaceship");

        assert_eq!(schema.uniform_buffer_count(2), 2);
        let bindings = schema.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(
            bindings[0].kind,
            BindingKind::UniformBuffer { slot: 0, size: 192 }
        );
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(
            bindings[1].kind,
            BindingKind::CombinedImageSampler {
                image: "duckSpaceship".into()
            }
        );
        assert_eq!(bindings[1].stages, ShaderStages::FRAGMENT);
    }

    #[test]
    fn samplers_follow_all_uniform_buffers() {
        let schema = DescriptorSchema::new()
            .with_image("a")
            .with_ubo(64, ShaderStages::VERTEX)
            .with_image("b")
            .with_ubo(16, ShaderStages::VERTEX | ShaderStages::FRAGMENT);

        let numbers: Vec<u32> = schema.bindings().iter().map(|b| b.binding).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        let kinds = schema.bindings();
        assert!(matches!(kinds[1].kind, BindingKind::UniformBuffer { slot: 1, size: 16 }));
        assert!(matches!(&kinds[2].kind, BindingKind::CombinedImageSampler { image } if image == "a"));
        assert!(matches!(&kinds[3].kind, BindingKind::CombinedImageSampler { image } if image == "b"));
    }

    #[test]
    fn buffer_index_is_frame_major() {
        let schema = DescriptorSchema::new()
            .with_ubo(64, ShaderStages::VERTEX)
            .with_ubo(32, ShaderStages::FRAGMENT)
            .with_ubo(16, ShaderStages::FRAGMENT);
        assert_eq!(schema.uniform_buffer_count(2), 6);
        assert_eq!(schema.buffer_index(0, 2), 2);
        assert_eq!(schema.buffer_index(1, 0), 3);
        assert_eq!(schema.buffer_index(1, 2), 5);
    }
}
