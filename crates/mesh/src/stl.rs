//! STL decoding. Stored facet normals are ignored; normals come from vertex winding.

use rpod_core::vector::Vector3;

use crate::MeshError;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Decode STL bytes, detecting binary vs ASCII by the facet count in the header.
pub fn parse(bytes: &[u8]) -> Result<Vec<[Vector3; 3]>, MeshError> {
    if looks_binary(bytes) {
        parse_binary(bytes)
    } else {
        parse_ascii(&String::from_utf8_lossy(bytes))
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = facet_count(bytes);
    let expected = HEADER_LEN + 4 + count * FACET_LEN;
    expected == bytes.len() || !bytes.trim_ascii_start().starts_with(b"solid")
}

fn facet_count(bytes: &[u8]) -> usize {
    let raw = [
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ];
    u32::from_le_bytes(raw) as usize
}

pub fn parse_binary(bytes: &[u8]) -> Result<Vec<[Vector3; 3]>, MeshError> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(MeshError::Truncated {
            expected: HEADER_LEN + 4,
            found: bytes.len(),
        });
    }
    let count = facet_count(bytes);
    let expected = HEADER_LEN + 4 + count * FACET_LEN;
    if bytes.len() < expected {
        return Err(MeshError::Truncated {
            expected,
            found: bytes.len(),
        });
    }

    let body = &bytes[HEADER_LEN + 4..expected];
    let triangles = body
        .chunks_exact(FACET_LEN)
        .map(|facet| {
            // 12 bytes of stored normal, then three vertices, then 2 attribute bytes.
            let mut vertices = [[0.0; 3]; 3];
            for (v, vertex) in vertices.iter_mut().enumerate() {
                for (c, coord) in vertex.iter_mut().enumerate() {
                    let at = 12 + v * 12 + c * 4;
                    let raw = [facet[at], facet[at + 1], facet[at + 2], facet[at + 3]];
                    *coord = f32::from_le_bytes(raw) as f64;
                }
            }
            vertices
        })
        .collect();
    Ok(triangles)
}

pub fn parse_ascii(text: &str) -> Result<Vec<[Vector3; 3]>, MeshError> {
    let mut triangles = Vec::new();
    let mut pending: Vec<Vector3> = Vec::with_capacity(3);

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let mut vertex = [0.0; 3];
                for coord in vertex.iter_mut() {
                    let token = tokens.next().ok_or_else(|| MeshError::Ascii {
                        line: line_no,
                        reason: "vertex needs three coordinates".to_string(),
                    })?;
                    *coord = token.parse().map_err(|_| MeshError::Ascii {
                        line: line_no,
                        reason: format!("invalid coordinate `{token}`"),
                    })?;
                }
                if pending.len() == 3 {
                    return Err(MeshError::Ascii {
                        line: line_no,
                        reason: "more than three vertices in facet".to_string(),
                    });
                }
                pending.push(vertex);
            }
            Some("endloop") => {
                if pending.len() != 3 {
                    return Err(MeshError::Ascii {
                        line: line_no,
                        reason: format!("facet has {} vertices", pending.len()),
                    });
                }
                triangles.push([pending[0], pending[1], pending[2]]);
                pending.clear();
            }
            _ => {}
        }
    }

    if !pending.is_empty() {
        return Err(MeshError::Ascii {
            line: text.lines().count(),
            reason: "unterminated facet".to_string(),
        });
    }
    Ok(triangles)
}
