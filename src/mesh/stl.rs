use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::tri::TriMesh;

/// Write meshes to a binary STL file
///
/// Binary STL format:
/// - 80 byte header
/// - 4 byte u32 triangle count (little endian)
/// - For each triangle:
///   - 3 x f32 normal (12 bytes)
///   - 3 x 3 x f32 vertices (36 bytes)
///   - 2 byte attribute (usually 0)
///
/// Fragments are concatenated; per-fragment colors are not representable in
/// STL and are discarded.
pub fn write_stl<'a>(path: &Path, meshes: impl IntoIterator<Item = &'a TriMesh>) -> Result<()> {
    let meshes: Vec<&TriMesh> = meshes.into_iter().collect();

    let file = File::create(path)
        .with_context(|| format!("Failed to create STL file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let header: [u8; 80] =
        *b"terratile - printable map tile composer                                         ";
    writer.write_all(&header)?;

    // Triangle count (u32, little endian)
    let count: usize = meshes.iter().map(|m| m.faces.len()).sum();
    writer.write_all(&(count as u32).to_le_bytes())?;

    for mesh in meshes {
        for (i, face) in mesh.faces.iter().enumerate() {
            let normal = mesh.face_normal(i);
            for &n in &normal {
                writer.write_all(&(n as f32).to_le_bytes())?;
            }

            for &idx in face {
                let v = mesh.vertices[idx as usize];
                for &coord in &v {
                    writer.write_all(&(coord as f32).to_le_bytes())?;
                }
            }

            // Attribute byte count (2 bytes, usually 0)
            writer.write_all(&[0u8, 0u8])?;
        }
    }

    writer.flush()?;

    Ok(())
}

/// Get the file size of an STL with the given number of triangles
pub fn estimate_stl_size(triangle_count: usize) -> usize {
    // 80 (header) + 4 (count) + triangles * (12 normal + 36 vertices + 2 attribute)
    80 + 4 + triangle_count * 50
}
