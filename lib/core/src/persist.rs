//! Binary serialization of an index.
//!
//! Layout: 4-byte magic, 4-byte little-endian format version, a bincode
//! header carrying the options and entry point, then one record per node
//! (identifier, tombstone flag, neighbor lists) followed by the node's raw
//! vector bytes. The kernel itself is never serialized: loading re-selects
//! the fastest implementation for the machine doing the loading.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vicinity_kernels::{Kernel, MetricKind, ScalarKind};

use crate::graph::{EntryPoint, Graph, Node};
use crate::{Error, IndexOptions, Result};

const MAGIC: [u8; 4] = *b"VCNI";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    dims: u64,
    scalar_kind: ScalarKind,
    metric: MetricKind,
    m: u64,
    ef_construction: u64,
    ef_search: u64,
    seed: u64,
    entry: Option<(u32, u32)>,
    count: u64,
}

#[derive(Serialize, Deserialize)]
struct NodeRecord {
    id: u64,
    deleted: bool,
    layers: Vec<Vec<u32>>,
}

fn from_bincode(err: bincode::Error) -> Error {
    match *err {
        bincode::ErrorKind::Io(io) => Error::Io(io),
        other => Error::Corrupted(other.to_string()),
    }
}

pub(crate) fn save<W: Write>(options: &IndexOptions, graph: &Graph, mut writer: W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;

    let header = Header {
        dims: options.dims as u64,
        scalar_kind: options.scalar_kind,
        metric: options.metric,
        m: options.m as u64,
        ef_construction: options.ef_construction as u64,
        ef_search: options.ef_search as u64,
        seed: options.seed,
        entry: graph.entry.map(|e| (e.slot, e.layer as u32)),
        count: graph.nodes.len() as u64,
    };
    bincode::serialize_into(&mut writer, &header).map_err(from_bincode)?;

    for (slot, node) in graph.nodes.iter().enumerate() {
        let record = NodeRecord {
            id: node.id,
            deleted: node.deleted,
            layers: node.layers.iter().cloned().collect(),
        };
        bincode::serialize_into(&mut writer, &record).map_err(from_bincode)?;
        writer.write_all(graph.vector(slot as u32))?;
    }

    debug!(nodes = graph.nodes.len(), "index saved");
    Ok(())
}

pub(crate) fn load<R: Read>(mut reader: R) -> Result<(IndexOptions, Graph)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::Corrupted("bad magic bytes".into()));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(Error::Corrupted(format!(
            "unsupported format version {version}"
        )));
    }

    let header: Header = bincode::deserialize_from(&mut reader).map_err(from_bincode)?;
    let options = IndexOptions {
        dims: header.dims as usize,
        scalar_kind: header.scalar_kind,
        metric: header.metric,
        m: header.m as usize,
        ef_construction: header.ef_construction as usize,
        ef_search: header.ef_search as usize,
        seed: header.seed,
    };
    options.validate()?;

    let kernel = Kernel::bind(options.scalar_kind, options.metric)?;
    let mut graph = Graph::new(&options, kernel);

    let count = header.count as usize;
    graph.reserve(count);

    let bytes_per_vector = graph.bytes_per_vector;
    let mut buf = vec![0u8; bytes_per_vector];
    for slot in 0..count {
        let record: NodeRecord = bincode::deserialize_from(&mut reader).map_err(from_bincode)?;
        reader.read_exact(&mut buf)?;
        graph.vectors.extend_from_slice(&buf);
        if !record.deleted {
            graph.id_to_slot.insert(record.id, slot as u32);
            graph.live += 1;
        }
        graph.nodes.push(Node {
            id: record.id,
            deleted: record.deleted,
            layers: record.layers.into_iter().collect(),
        });
    }

    for node in &graph.nodes {
        for list in node.layers.iter() {
            if list.iter().any(|&n| n as usize >= count) {
                return Err(Error::Corrupted("neighbor link out of range".into()));
            }
        }
    }
    graph.entry = match header.entry {
        Some((slot, layer)) if (slot as usize) < count => Some(EntryPoint {
            slot,
            layer: layer as usize,
        }),
        Some(_) => return Err(Error::Corrupted("entry point out of range".into())),
        None => None,
    };

    debug!(nodes = count, live = graph.live, "index loaded");
    Ok((options, graph))
}

#[cfg(test)]
mod tests {
    use crate::{Index, IndexOptions};
    use vicinity_kernels::{MetricKind, ScalarKind};

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn buffer_round_trip_reproduces_results() {
        let index = Index::new(IndexOptions {
            dims: 8,
            metric: MetricKind::SqEuclidean,
            ..IndexOptions::default()
        })
        .unwrap();
        for i in 0..100u64 {
            let mut v = [0.0f32; 8];
            v[(i % 8) as usize] = i as f32 / 10.0;
            v[((i + 3) % 8) as usize] = 1.0;
            index.insert(i, &f32_bytes(&v)).unwrap();
        }
        index.remove(17).unwrap();

        let mut bytes = Vec::new();
        index.save(&mut bytes).unwrap();
        let restored = Index::load(bytes.as_slice()).unwrap();

        assert_eq!(restored.len(), index.len());
        assert!(!restored.contains(17));

        let query = f32_bytes(&[0.5, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let before = index.search_with_ef(&query, 10, 128).unwrap();
        let after = restored.search_with_ef(&query, 10, 128).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn file_round_trip() {
        let index = Index::new(IndexOptions {
            dims: 4,
            scalar_kind: ScalarKind::F32,
            metric: MetricKind::Cosine,
            ..IndexOptions::default()
        })
        .unwrap();
        for i in 0..20u64 {
            index
                .insert(i, &f32_bytes(&[i as f32, 1.0, 0.5, -1.0]))
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        index.save(std::fs::File::create(&path).unwrap()).unwrap();
        let restored = Index::load(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(restored.len(), 20);
        assert_eq!(restored.options(), index.options());
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(Index::load(&b"not an index"[..]).is_err());
        let mut bytes = Vec::new();
        Index::new(IndexOptions::default())
            .unwrap()
            .save(&mut bytes)
            .unwrap();
        bytes[0] ^= 0xFF;
        assert!(Index::load(bytes.as_slice()).is_err());
    }
}
