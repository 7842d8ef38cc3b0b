//! Wavefront OBJ reader. Each `o`/`g` block becomes its own mesh; vertex
//! attribute pools are shared across the whole file as the format requires.

use std::{
    collections::HashMap,
    io::{self, BufRead},
};

use anyhow::{Context, Result, anyhow};

use crate::mesh::{MeshData, MeshVertex};

/// Name used for faces that appear before any `o`/`g` directive.
const DEFAULT_MESH_NAME: &str = "default";

/// Parse every mesh in an OBJ stream.
pub fn read_obj_meshes<R: BufRead>(reader: R) -> Result<Vec<MeshData>> {
    ObjReader::default().read(reader)
}

/// Convenience helper for OBJ sources held in memory.
pub fn read_obj_meshes_from_str(contents: &str) -> Result<Vec<MeshData>> {
    read_obj_meshes(io::Cursor::new(contents))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Corner(usize, Option<usize>, Option<usize>);

/// Mesh under construction: dedups face corners into shared vertices.
struct MeshBuilder {
    name: String,
    unique: HashMap<Corner, u32>,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: HashMap::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn finish(self) -> Option<MeshData> {
        (!self.indices.is_empty()).then(|| MeshData::new(self.name, self.vertices, self.indices))
    }
}

#[derive(Default)]
struct ObjReader {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    meshes: Vec<MeshData>,
    current: Option<MeshBuilder>,
}

impl ObjReader {
    fn read<R: BufRead>(mut self, reader: R) -> Result<Vec<MeshData>> {
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };

            match tag {
                "v" => {
                    let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                    let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                    let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                    self.positions.push([x, y, z]);
                }
                "vt" => {
                    let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                    let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                    self.texcoords.push([u, v]);
                }
                "vn" => {
                    let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                    let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                    let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                    self.normals.push([nx, ny, nz]);
                }
                "o" | "g" => {
                    let name = parts.collect::<Vec<_>>().join(" ");
                    self.start_mesh(if name.is_empty() {
                        DEFAULT_MESH_NAME.to_owned()
                    } else {
                        name
                    });
                }
                "f" => self.read_face(parts, line_no)?,
                // usemtl/mtllib/s/l/p carry nothing the scene keeps.
                _ => {}
            }
        }

        if let Some(mesh) = self.current.take().and_then(MeshBuilder::finish) {
            self.meshes.push(mesh);
        }
        if self.meshes.is_empty() {
            anyhow::bail!("OBJ contained no triangles");
        }
        Ok(self.meshes)
    }

    fn start_mesh(&mut self, name: String) {
        if let Some(mesh) = self.current.take().and_then(MeshBuilder::finish) {
            self.meshes.push(mesh);
        }
        self.current = Some(MeshBuilder::new(name));
    }

    fn read_face<'a>(
        &mut self,
        parts: impl Iterator<Item = &'a str>,
        line_no: usize,
    ) -> Result<()> {
        let mesh = self
            .current
            .get_or_insert_with(|| MeshBuilder::new(DEFAULT_MESH_NAME));

        let mut corners: Vec<u32> = Vec::new();
        for part in parts {
            let (vi, vti, vni) = parse_face_vertex(
                part,
                self.positions.len(),
                self.texcoords.len(),
                self.normals.len(),
                line_no,
            )?;
            let key = Corner(vi, vti, vni);
            let index = match mesh.unique.get(&key) {
                Some(&idx) => idx,
                None => {
                    let position = self.positions[vi];
                    let uv = vti.map_or([0.0, 0.0], |i| self.texcoords[i]);
                    let normal = vni.map_or([0.0, 0.0, 1.0], |i| self.normals[i]);

                    let idx = u32::try_from(mesh.vertices.len())
                        .map_err(|_| anyhow!("Too many vertices in mesh '{}'", mesh.name))?;
                    mesh.vertices.push(MeshVertex::new(position, normal, uv));
                    mesh.unique.insert(key, idx);
                    idx
                }
            };
            corners.push(index);
        }

        if corners.len() < 3 {
            return Ok(());
        }
        // Triangulate fan
        for tri in 1..(corners.len() - 1) {
            mesh.indices
                .extend_from_slice(&[corners[0], corners[tri], corners[tri + 1]]);
        }
        Ok(())
    }
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

/// OBJ indices are 1-based; negative values count back from the latest element.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };
    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_before_any_group_land_in_default_mesh() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let meshes = read_obj_meshes_from_str(src).expect("parse triangle");
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].name, DEFAULT_MESH_NAME);
        assert_eq!(meshes[0].vertices.len(), 3);
        assert_eq!(meshes[0].indices, vec![0, 1, 2]);
        assert!(meshes[0].is_valid());
    }

    #[test]
    fn objects_split_into_separate_meshes_sharing_pools() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
o quad
f 1 2 3 4
o empty
g tri
f -4 -3 -2
";
        let meshes = read_obj_meshes_from_str(src).expect("parse groups");
        let names: Vec<_> = meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["quad", "tri"]);
        // Quad is fan-triangulated over four deduplicated corners.
        assert_eq!(meshes[0].vertices.len(), 4);
        assert_eq!(meshes[0].indices, vec![0, 1, 2, 0, 2, 3]);
        // Negative indices resolve against the shared position pool.
        assert_eq!(meshes[1].vertices[2].position, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn zero_index_is_rejected_with_line_number() {
        let err = read_obj_meshes_from_str("v 0 0 0\nf 0 1 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn file_without_triangles_is_an_error() {
        let err = read_obj_meshes_from_str("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert_eq!(err.to_string(), "OBJ contained no triangles");
    }
}
