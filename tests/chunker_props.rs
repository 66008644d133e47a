//! Property tests for chunking invariants and filtered search ordering.

use std::collections::HashMap;

use docrag::chunking::{Chunker, SemanticChunker};
use docrag::document::Chunk;
use docrag::inmemory::InMemoryVectorStore;
use docrag::vectorstore::{MetadataFilter, VectorStore};
use proptest::prelude::*;

/// Reassemble the original text by stripping the leading overlap from every
/// chunk after the first.
fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}

/// For any text and any valid (size, overlap) pair, the semantic chunker
/// SHALL produce chunks no longer than `chunk_size`, overlapping by exactly
/// `chunk_overlap` characters, whose concatenation with overlaps removed
/// reproduces the input exactly.
mod prop_chunker_invariants {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_bounded_overlapping_and_lossless(
            text in "[a-zA-Z \\n.!?]{0,600}",
            chunk_size in 20usize..200,
            chunk_overlap in 0usize..15,
        ) {
            let chunker = SemanticChunker::new(chunk_size, chunk_overlap);
            let chunks = chunker.chunk("doc-1", &text, &HashMap::new());

            if text.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            for chunk in &chunks {
                prop_assert!(chunk.text.chars().count() <= chunk_size);
            }

            for pair in chunks.windows(2) {
                let a: Vec<char> = pair[0].text.chars().collect();
                let b: Vec<char> = pair[1].text.chars().collect();
                prop_assert!(a.len() >= chunk_overlap);
                prop_assert_eq!(&a[a.len() - chunk_overlap..], &b[..chunk_overlap]);
            }

            prop_assert_eq!(reconstruct(&chunks, chunk_overlap), text);

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.id.clone(), format!("doc-1-{i}"));
            }
        }

        #[test]
        fn chunking_is_deterministic(
            text in "[a-z \\n.]{0,400}",
            chunk_size in 20usize..120,
            chunk_overlap in 0usize..10,
        ) {
            let chunker = SemanticChunker::new(chunk_size, chunk_overlap);
            let a = chunker.chunk("doc-1", &text, &HashMap::new());
            let b = chunker.chunk("doc-1", &text, &HashMap::new());
            prop_assert_eq!(a, b);
        }
    }
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a chunk owned by one of two users, with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", prop::bool::ANY, arb_normalized_embedding(dim)).prop_map(
        |(id, owned_by_alice, embedding)| {
            let user = if owned_by_alice { "alice" } else { "bob" };
            Chunk {
                id,
                text: "text".to_string(),
                embedding,
                metadata: HashMap::from([
                    ("user_id".to_string(), user.to_string()),
                    ("document_id".to_string(), "doc-1".to_string()),
                ]),
                document_id: "doc-1".to_string(),
            }
        },
    )
}

/// For any set of chunks owned by two users, a search filtered to one user
/// SHALL return only that user's chunks, ordered by descending cosine
/// similarity, with at most `top_k` results.
mod prop_filtered_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_isolated_ordered_and_bounded(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, alice_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();

                // Deduplicate chunks by id to avoid upsert overwriting.
                let mut deduped: HashMap<String, Chunk> = HashMap::new();
                for chunk in &chunks {
                    deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
                }
                let unique_chunks: Vec<Chunk> = deduped.into_values().collect();
                let alice_count = unique_chunks
                    .iter()
                    .filter(|c| c.metadata.get("user_id").map(String::as_str) == Some("alice"))
                    .count();

                store.upsert(&unique_chunks).await.unwrap();
                let filter = MetadataFilter::new().eq("user_id", "alice");
                let results = store.search(&query, top_k, &filter).await.unwrap();
                (results, alice_count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= alice_count);
            if top_k >= alice_count {
                prop_assert_eq!(results.len(), alice_count);
            }

            for result in &results {
                prop_assert_eq!(
                    result.chunk.metadata.get("user_id").map(String::as_str),
                    Some("alice")
                );
            }

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
