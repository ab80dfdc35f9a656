#![allow(missing_docs)]
#![cfg(feature = "filesystem")]

use std::error::Error;

use dmrpp::codec::{deflate, shuffle};
use dmrpp::{Hyperslab, ReadRequest, ReadSession, ReaderOptions, VariableManifest};

#[test]
#[cfg_attr(miri, ignore)]
fn read_filesystem() -> Result<(), Box<dyn Error>> {
    // a [6, 5] array of i32 in [4, 4] chunks, values -(5 * i + j)
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("granule.h5");

    // a header the manifest skips over
    let mut file = vec![0xffu8; 96];
    let mut chunks = Vec::new();
    for (row, col) in [(0u64, 0u64), (0, 4), (4, 0), (4, 4)] {
        let decoded: Vec<u8> = (row..row + 4)
            .flat_map(|i| (col..col + 4).map(move |j| -i32::try_from(5 * i + j).unwrap()))
            .flat_map(i32::to_le_bytes)
            .collect();
        let encoded = deflate::deflate(&shuffle::shuffle(&decoded, 4)?, 9)?;
        chunks.push(serde_json::json!({
            "source": path.to_str().unwrap(),
            "byte_offset": file.len(),
            "byte_length": encoded.len(),
            "position_in_array": format!("[{row},{col}]"),
        }));
        file.extend_from_slice(&encoded);
    }
    std::fs::write(&path, file)?;

    let manifest: VariableManifest = serde_json::from_value(serde_json::json!({
        "array_shape": [6, 5],
        "chunk_shape": [4, 4],
        "element_size": 4,
        "byte_order": "little_endian",
        "compression": {
            "filters": [{"name": "shuffle", "element_size": 4}, {"name": "deflate"}],
            "order": "legacy"
        },
        "chunks": chunks,
    }))?;

    let session = ReadSession::new_filesystem(ReaderOptions::default());
    let elements: Vec<i32> = session.read_elements(&ReadRequest::new(&manifest))?;
    let expected: Vec<i32> = (0..30).map(|v| -v).collect();
    assert_eq!(elements, expected);

    // the last column
    let selection = Hyperslab::new_contiguous(vec![0, 4], vec![6, 1])?;
    let column: Vec<i32> =
        session.read_elements(&ReadRequest::new(&manifest).with_selection(selection))?;
    assert_eq!(column, [-4, -9, -14, -19, -24, -29]);
    assert_eq!(session.pool().outstanding(), 0);
    Ok(())
}
