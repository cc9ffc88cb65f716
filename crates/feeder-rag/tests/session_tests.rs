use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

use feeder_core::config::LlmSettings;
use feeder_core::corpus::CorpusLoader;
use feeder_core::error::Error;
use feeder_embed::{FakeEmbedder, MINILM_DIM};
use feeder_llm::{Generator, OllamaClient, ERROR_RESPONSE};
use feeder_rag::{retrieve, ConversationState, HistoryPolicy, RagSession, Retriever};
use feeder_vector::IndexBuilder;

struct Recorder { prompts: Mutex<Vec<String>>, reply: String }

impl Recorder {
    fn new(reply: &str) -> Self { Self { prompts: Mutex::new(Vec::new()), reply: reply.to_string() } }
    fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

impl Generator for Recorder {
    async fn generate(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

struct Project { _tmp: TempDir, index_path: PathBuf, metadata_path: PathBuf }

async fn build_project(files: &[(&str, &str)], embedder: &FakeEmbedder) -> Project {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    for (name, body) in files { fs::write(corpus.join(name), body).unwrap(); }
    let chunks = CorpusLoader::default().load_chunks(&corpus).unwrap();
    let index_path = tmp.path().join("codebase_index.lance");
    let metadata_path = tmp.path().join("metadata.txt");
    IndexBuilder::new(&index_path, &metadata_path).with_progress(false).build(&chunks, embedder).await.unwrap();
    Project { _tmp: tmp, index_path, metadata_path }
}

#[tokio::test]
async fn retrieve_ranks_exact_chunk_first() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let body = "x".repeat(1200);
    let project = build_project(&[("a.py", body.as_str())], &embedder).await;

    let results = retrieve(&"x".repeat(200), &project.index_path, &embedder, &project.metadata_path, 5).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].file_path.ends_with("a.py"));
    assert_eq!(results[0].text.chars().count(), 200);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn hits_without_metadata_are_dropped() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let project = build_project(&[("a.txt", "alpha beta"), ("b.txt", "gamma delta")], &embedder).await;
    // keep only the first record; the second id no longer resolves
    let first = fs::read_to_string(&project.metadata_path).unwrap().lines().next().unwrap().to_string();
    fs::write(&project.metadata_path, format!("{first}\n")).unwrap();

    let results = retrieve("gamma delta", &project.index_path, &embedder, &project.metadata_path, 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].file_path.ends_with("a.txt"));
}

#[tokio::test]
async fn missing_index_fails_loudly() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(8);
    let err = retrieve("q", &tmp.path().join("nope"), &embedder, &tmp.path().join("metadata.txt"), 5).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
}

#[tokio::test]
async fn session_builds_prompt_from_history_and_records_answer() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let project = build_project(&[("lib.rs", "pub fn add(a: i32, b: i32) -> i32 { a + b }")], &embedder).await;
    let retriever = Retriever::open(&project.index_path, &project.metadata_path, &embedder).await.unwrap();
    let session = RagSession::new(retriever, Recorder::new("It adds."), 1);
    let mut state = ConversationState::new("Answer briefly.", HistoryPolicy::unbounded());

    let turn = session.ask(&mut state, "what does add do?").await.unwrap();
    assert!(turn.has_context());
    assert_eq!(turn.answer, "It adds.");

    let prompts = session.generator().prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.starts_with("Answer briefly.\n\nContext:\n"));
    assert!(prompt.contains("lib.rs: pub fn add"));
    assert!(prompt.ends_with("\n\nUser: what does add do?\n\nwhat does add do?"));
    assert!(state.as_str().ends_with("User: what does add do?\nAssistant: It adds."));
}

#[tokio::test]
async fn zero_k_falls_back_to_context_free_prompt() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let project = build_project(&[("a.md", "some notes")], &embedder).await;
    let retriever = Retriever::open(&project.index_path, &project.metadata_path, &embedder).await.unwrap();
    let session = RagSession::new(retriever, Recorder::new("ok"), 0);
    let mut state = ConversationState::new("Seed.", HistoryPolicy::unbounded());

    let turn = session.ask(&mut state, "hello").await.unwrap();
    assert!(!turn.has_context());
    assert_eq!(session.generator().prompts()[0], "Seed.\n\nUser: hello\n\nhello");
}

#[tokio::test]
async fn unreachable_backend_still_returns_context() {
    let embedder = FakeEmbedder::new(MINILM_DIM);
    let project = build_project(&[("a.py", "def main(): pass")], &embedder).await;
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let client = OllamaClient::new(&LlmSettings { endpoint: format!("http://127.0.0.1:{port}/api/generate"), model: "llama2".into(), timeout_secs: 5 }).unwrap();
    let retriever = Retriever::open(&project.index_path, &project.metadata_path, &embedder).await.unwrap();
    let session = RagSession::new(retriever, client, 5);
    let mut state = ConversationState::new("Seed.", HistoryPolicy::default());

    let turn = session.ask(&mut state, "def main(): pass").await.unwrap();
    assert_eq!(turn.results.len(), 1);
    assert!(turn.results[0].distance.abs() < 1e-4);
    assert_eq!(turn.answer, ERROR_RESPONSE);
    assert!(state.as_str().ends_with(&format!("Assistant: {ERROR_RESPONSE}")));
}

#[tokio::test]
async fn session_talks_to_http_backend() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"response\":\"Hi\"}\n{\"response\":\" there\",\"done\":true}\n"))
        .expect(2)
        .mount(&server)
        .await;

    let embedder = FakeEmbedder::new(MINILM_DIM);
    let project = build_project(&[("a.txt", "greeting text")], &embedder).await;
    let client = OllamaClient::new(&LlmSettings { endpoint: format!("{}/api/generate", server.uri()), ..LlmSettings::default() }).unwrap();
    let retriever = Retriever::open(&project.index_path, &project.metadata_path, &embedder).await.unwrap();
    let session = RagSession::new(retriever, client, 5);
    let mut state = ConversationState::new("Seed.", HistoryPolicy::default());

    assert_eq!(session.ask(&mut state, "greeting").await.unwrap().answer, "Hi there");
    assert_eq!(session.ask(&mut state, "again").await.unwrap().answer, "Hi there");
    let requests = server.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(second["prompt"].as_str().unwrap().contains("Assistant: Hi there"));
}
