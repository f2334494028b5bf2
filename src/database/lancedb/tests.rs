use std::collections::BTreeMap;

use super::*;

#[test]
fn chunk_record_serialization() {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), "data/diet_plan.pdf".to_string());
    metadata.insert("page".to_string(), "4".to_string());

    let record = ChunkRecord {
        id: "row_1".to_string(),
        vector: vec![0.1, 0.2, 0.3],
        chunk: Chunk {
            text: "Drink two litres of water a day.".to_string(),
            ordinal: 7,
            overlap: 0,
            metadata,
        },
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&record).expect("can serialize json");
    let parsed: ChunkRecord = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(parsed.vector, record.vector);
    assert_eq!(parsed.chunk, record.chunk);
    assert_eq!(parsed.chunk.metadata.get("page").map(String::as_str), Some("4"));
}
