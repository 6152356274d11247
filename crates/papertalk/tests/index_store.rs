//! Saving and reloading indexes through SQLite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use papertalk::config::Config;
use papertalk::index_store::{load_index, save_index, IndexMeta};
use papertalk::pipeline::prepare_index;
use papertalk_core::chunk::{content_hash, split_text, ChunkConfig};
use papertalk_core::embedding::Embedder;
use papertalk_core::index::Index;

const DIMS: usize = 64;
const PETS: &str = "A cat sat. A dog ran. Cats and dogs are pets.";

/// Hashed bag-of-words embedder that counts how many texts it embedded.
struct BagOfWords {
    embedded: AtomicUsize,
}

impl BagOfWords {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            embedded: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> papertalk_core::Result<Vec<Vec<f32>>> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; DIMS];
                for word in t
                    .to_lowercase()
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let bucket = word
                        .bytes()
                        .fold(0xcbf29ce484222325u64, |h, b| {
                            (h ^ b as u64).wrapping_mul(0x100000001b3)
                        });
                    v[(bucket % DIMS as u64) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

fn chunking() -> ChunkConfig {
    ChunkConfig {
        chunk_size: 20,
        overlap: 5,
    }
}

fn doc(name: &str, text: &str) -> Vec<(String, String)> {
    vec![(name.to_string(), text.to_string())]
}

fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.chunking.chunk_size = 20;
    config.chunking.overlap = 5;
    config.index.path = dir.join("index.sqlite");
    config
}

#[tokio::test]
async fn saved_index_ranks_like_the_built_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pets.sqlite");
    let embedder = BagOfWords::new();

    let chunks = split_text(PETS, &chunking()).unwrap();
    let built = Index::build(chunks, embedder.clone(), 2).await.unwrap();
    let meta = IndexMeta::new(
        "ollama",
        "bag-of-words",
        DIMS,
        &chunking(),
        content_hash(PETS),
    );
    save_index(&path, &built, &meta).await.unwrap();

    let stored = load_index(&path).await.unwrap().unwrap();
    assert_eq!(stored.meta, meta);
    assert_eq!(stored.chunks, built.chunks());
    assert!(stored.matches(&meta));

    let reloaded = stored.into_index(embedder).await.unwrap();
    for query in ["What did the cat do?", "dogs", "pets and cats"] {
        let a = built.query(query, 3).await.unwrap();
        let b = reloaded.query(query, 3).await.unwrap();
        let ids_a: Vec<&str> = a.iter().map(|s| s.chunk.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|s| s.chunk.id.as_str()).collect();
        assert_eq!(ids_a, ids_b, "ranking differs for {:?}", query);
    }
}

#[tokio::test]
async fn saving_replaces_the_previous_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replace.sqlite");
    let embedder = BagOfWords::new();

    for text in [PETS, "Short text."] {
        let chunks = split_text(text, &chunking()).unwrap();
        let index = Index::build(chunks, embedder.clone(), 8).await.unwrap();
        let meta = IndexMeta::new(
            "ollama",
            "bag-of-words",
            DIMS,
            &chunking(),
            content_hash(text),
        );
        save_index(&path, &index, &meta).await.unwrap();
    }

    let stored = load_index(&path).await.unwrap().unwrap();
    assert_eq!(stored.chunks.len(), 1);
    assert_eq!(stored.chunks[0].text, "Short text.");
    assert_eq!(stored.meta.source_hash, content_hash("Short text."));
}

#[tokio::test]
async fn matching_saved_index_is_reused_without_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.index.path.clone();

    let first = BagOfWords::new();
    let built = prepare_index(&config, &doc("pets.txt", PETS), first.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(first.embedded.load(Ordering::SeqCst), built.len());

    let second = BagOfWords::new();
    let reused = prepare_index(&config, &doc("pets.txt", PETS), second.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(second.embedded.load(Ordering::SeqCst), 0);
    assert_eq!(reused.chunks(), built.chunks());
}

#[tokio::test]
async fn changed_text_or_rebuild_flag_re_embeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.index.path.clone();

    prepare_index(&config, &doc("pets.txt", PETS), BagOfWords::new(), &path, false)
        .await
        .unwrap();

    let changed = BagOfWords::new();
    prepare_index(&config, &doc("pets.txt", "A bird sang."), changed.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(changed.embedded.load(Ordering::SeqCst), 1);

    let forced = BagOfWords::new();
    prepare_index(&config, &doc("pets.txt", "A bird sang."), forced.clone(), &path, true)
        .await
        .unwrap();
    assert_eq!(forced.embedded.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn several_documents_share_one_index() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.index.path.clone();
    let sources = vec![
        ("pets.txt".to_string(), PETS.to_string()),
        ("birds.md".to_string(), "A bird sang.".to_string()),
    ];

    let embedder = BagOfWords::new();
    let index = prepare_index(&config, &sources, embedder.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(index.len(), 4);
    let indices: Vec<usize> = index.chunks().iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let hits = index.query("bird sang", 1).await.unwrap();
    assert_eq!(hits[0].chunk.source.as_deref(), Some("birds.md"));

    // Sources survive the round trip through SQLite
    let stored = load_index(&path).await.unwrap().unwrap();
    assert_eq!(stored.chunks[0].source.as_deref(), Some("pets.txt"));
    assert_eq!(stored.chunks[3].source.as_deref(), Some("birds.md"));

    let again = BagOfWords::new();
    prepare_index(&config, &sources, again.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(again.embedded.load(Ordering::SeqCst), 0);

    // Dropping a document invalidates the saved index
    let fewer = BagOfWords::new();
    let index = prepare_index(&config, &sources[..1], fewer.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(fewer.embedded.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn changing_the_provider_re_embeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    let path = config.index.path.clone();
    let sources = doc("pets.txt", PETS);

    prepare_index(&config, &sources, BagOfWords::new(), &path, false)
        .await
        .unwrap();

    config.embedding.provider = "openai".to_string();
    let switched = BagOfWords::new();
    prepare_index(&config, &sources, switched.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(switched.embedded.load(Ordering::SeqCst), 3);
    let stored = load_index(&path).await.unwrap().unwrap();
    assert_eq!(stored.meta.provider, "openai");
}

#[tokio::test]
async fn unreadable_index_file_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.index.path.clone();
    std::fs::write(&path, vec![b'x'; 4096]).unwrap();

    let embedder = BagOfWords::new();
    let index = prepare_index(&config, &doc("pets.txt", PETS), embedder.clone(), &path, false)
        .await
        .unwrap();
    assert_eq!(embedder.embedded.load(Ordering::SeqCst), index.len());

    let stored = load_index(&path).await.unwrap().unwrap();
    assert_eq!(stored.chunks, index.chunks());
}
