//! Name → offset resolution for the program's uniform block, and the CPU-side
//! staging copy of that block.

use super::{ShaderProgram, UniformType};

/// Byte offset and type of one member of the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub ty: UniformType,
}

/// Uniform names resolved once after link, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct UniformLocations {
    entries: Vec<(String, Option<UniformLocation>)>,
}

impl UniformLocations {
    pub fn resolve(program: &ShaderProgram, names: &[&str]) -> Self {
        let mut entries: Vec<(String, Option<UniformLocation>)> = Vec::with_capacity(names.len());

        for &name in names {
            if entries.iter().any(|(n, _)| n == name) {
                continue;
            }

            let location = program
                .uniform_block()
                .and_then(|block| block.member(name))
                .map(|m| UniformLocation {
                    offset: m.offset,
                    ty: m.ty,
                });

            if location.is_none() {
                log::debug!("Uniform `{name}` not declared by this program; writes will be skipped.");
            }

            entries.push((name.to_owned(), location));
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<UniformLocation> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, location)| *location)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<UniformLocation>)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), *l))
    }

    pub fn resolved(&self) -> usize {
        self.entries.iter().filter(|(_, l)| l.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Host copy of the uniform block, uploaded whole once per frame.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Sized from the reflected block, rounded up to 16 bytes (minimum 16).
    pub fn for_program(program: &ShaderProgram) -> Self {
        let size = program.uniform_block().map_or(0, |b| b.size as usize);
        Self::with_size(size)
    }

    pub fn with_size(size: usize) -> Self {
        let size = size.max(1).next_multiple_of(16);
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_f32(&mut self, location: Option<UniformLocation>, value: f32) {
        self.write(location, UniformType::F32, bytemuck::bytes_of(&value));
    }

    pub fn set_i32(&mut self, location: Option<UniformLocation>, value: i32) {
        self.write(location, UniformType::I32, bytemuck::bytes_of(&value));
    }

    pub fn set_vec2(&mut self, location: Option<UniformLocation>, value: [f32; 2]) {
        self.write(location, UniformType::Vec2, bytemuck::cast_slice(&value));
    }

    fn write(&mut self, location: Option<UniformLocation>, expected: UniformType, data: &[u8]) {
        let Some(location) = location else {
            return;
        };

        if location.ty != expected {
            log::trace!(
                "Skipping uniform write at offset {}: declared {:?}, written {:?}.",
                location.offset,
                location.ty,
                expected
            );
            return;
        }

        let start = location.offset as usize;
        if let Some(dst) = self.bytes.get_mut(start..start + data.len()) {
            dst.copy_from_slice(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{tests::QUAD_VS, ProgramBuilder};

    const FS: &str = r#"
struct Globals {
    iResolution: vec2<f32>,
    iTime: f32,
    radius_data: i32,
};

@group(0) @binding(0) var<uniform> u: Globals;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv / u.iResolution, u.iTime, f32(u.radius_data));
}
"#;

    fn program() -> ShaderProgram {
        ProgramBuilder::new().build(QUAD_VS, FS).unwrap()
    }

    #[test]
    fn resolves_known_names_and_tolerates_unknown() {
        let program = program();
        let locations = UniformLocations::resolve(
            &program,
            &["iResolution", "iTime", "cam_zoom", "iTime", "radius_data"],
        );

        assert_eq!(locations.len(), 4);
        assert_eq!(locations.resolved(), 3);
        assert_eq!(
            locations.get("iResolution"),
            Some(UniformLocation {
                offset: 0,
                ty: UniformType::Vec2
            })
        );
        assert_eq!(locations.get("iTime").unwrap().offset, 8);
        assert_eq!(locations.get("radius_data").unwrap().offset, 12);
        assert_eq!(locations.get("cam_zoom"), None);
        assert_eq!(locations.get("never_asked"), None);

        let order: Vec<_> = locations.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["iResolution", "iTime", "cam_zoom", "radius_data"]);
    }

    #[test]
    fn block_writes_land_at_reflected_offsets() {
        let program = program();
        let locations = UniformLocations::resolve(&program, &["iResolution", "iTime", "radius_data"]);
        let mut block = UniformBlock::for_program(&program);

        assert_eq!(block.bytes().len(), 16);

        block.set_vec2(locations.get("iResolution"), [1920.0, 1080.0]);
        block.set_f32(locations.get("iTime"), 2.5);
        block.set_i32(locations.get("radius_data"), 0);

        let floats: Vec<f32> = block
            .bytes()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(&floats[..3], &[1920.0, 1080.0, 2.5]);
    }

    #[test]
    fn absent_or_mistyped_writes_are_skipped() {
        let program = program();
        let locations = UniformLocations::resolve(&program, &["iTime", "cam_zoom"]);
        let mut block = UniformBlock::for_program(&program);

        block.set_f32(locations.get("cam_zoom"), 3.0);
        block.set_vec2(locations.get("iTime"), [1.0, 1.0]);

        assert!(block.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn block_size_rounds_to_sixteen() {
        assert_eq!(UniformBlock::with_size(0).bytes().len(), 16);
        assert_eq!(UniformBlock::with_size(40).bytes().len(), 48);
        assert_eq!(UniformBlock::with_size(48).bytes().len(), 48);
    }
}
