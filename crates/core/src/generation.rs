//! Diagnosis and recommendation generation.
//!
//! Both steps send one prompt to an external text-generation service and consume its streamed
//! answer. The backend is abstracted behind [`CompletionBackend`] so that the HTTP client
//! ([`crate::groq::GroqClient`]) can be replaced by scripted streams in tests.
//!
//! Stream consumption is bounded: fragments are concatenated in arrival order, the result is only
//! returned once the backend signals completion, the whole consumption runs under a timeout, and
//! the accumulated size is capped. No partial text is returned on any failure.

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::summary::StructuredSummary;
use crate::ReportResult;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// One item of a streamed completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    /// The service finished the answer.
    Done,
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, GenerationError>>;

/// A single-prompt completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// Source of streamed completions.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a completion and return its event stream.
    ///
    /// Errors before the first event (connection, authentication, status) are returned here;
    /// errors while streaming are yielded as stream items.
    async fn open_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<EventStream, GenerationError>;
}

/// Bounds applied while consuming one stream.
#[derive(Clone, Copy, Debug)]
pub struct StreamLimits {
    pub timeout: Duration,
    pub max_output_chars: usize,
}

/// Concatenate a completion stream into one string.
///
/// # Errors
///
/// - `GenerationTimeout` if the stream does not complete within `limits.timeout` (the stream is
///   dropped, which cancels the underlying request),
/// - `OutputLimitExceeded` once more than `limits.max_output_chars` characters arrive,
/// - `IncompleteStream` if the stream ends without a `Done` event,
/// - `EmptyGeneration` if the stream completes with no non-whitespace content,
/// - any error yielded by the stream itself.
pub async fn collect_fragments(
    mut stream: EventStream,
    limits: StreamLimits,
) -> Result<String, GenerationError> {
    let consume = async move {
        let mut text = String::new();
        let mut chars = 0usize;
        let mut fragments = 0usize;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Fragment(fragment) => {
                    chars += fragment.chars().count();
                    if chars > limits.max_output_chars {
                        return Err(GenerationError::OutputLimitExceeded {
                            limit: limits.max_output_chars,
                        });
                    }
                    fragments += 1;
                    text.push_str(&fragment);
                }
                StreamEvent::Done => {
                    if text.trim().is_empty() {
                        return Err(GenerationError::EmptyGeneration);
                    }
                    tracing::debug!(
                        "stream completed: {} fragments, {} chars",
                        fragments,
                        chars
                    );
                    return Ok(text);
                }
            }
        }

        Err::<String, GenerationError>(GenerationError::IncompleteStream)
    };

    tokio::time::timeout(limits.timeout, consume)
        .await
        .map_err(|_| GenerationError::GenerationTimeout(limits.timeout))?
}

/// Prompt asking for a preliminary diagnosis of the summarised patient.
pub fn diagnosis_prompt(summary_block: &str) -> String {
    format!(
        "Vous êtes un assistant médical expert. Sur la base des données fournies sur le patient, \
analysez les informations et fournissez un diagnostic préliminaire ou identifiez d'éventuelles \
préoccupations. Prenez en compte les éléments suivants :\n\n{summary_block}\n\n\
Soyez concis mais précis. S'il n'y a pas suffisamment d'informations pour établir un diagnostic \
concluant, suggérez des tests ou des données supplémentaires qui permettraient de clarifier l'état \
du patient. Ne faites aucune supposition sur la santé du patient.\n\n\
Votre réponse doit être formatée comme suit :\n\n\
Diagnostic : <diagnostic>\n\
Tests ou Données Supplémentaires Requises : <tests ou données>\n\n\
Réponse :"
    )
}

/// Prompt asking for recommendations given the summary and the generated diagnosis.
pub fn recommendation_prompt(summary_block: &str, diagnosis: &str) -> String {
    format!(
        "Vous êtes un assistant médical expert en soins aux patients. Ci-dessous se trouvent un \
rapport de patient, un diagnostic et un contexte médical pertinent. Sur la base de ces \
informations, fournissez des recommandations claires et actionnables, telles que des traitements \
ou des ajustements de style de vie.\n\n\
Rapport du Patient :\n{summary_block}\n\n\
Diagnostic :\n{diagnosis}\n\n\
Sortie :\n\
Recommandations : Fournissez des étapes détaillées à suivre, incluant des traitements, des \
changements de mode de vie ou des tests, adaptés à l'état du patient et au contexte fourni.\n\n\
Votre réponse doit être formatée comme suit, n'ajoute rien d'autre que les recommandations :\n\n\
Recommandations court terme : <recommandations court terme>\n\
Recommandations moyen terme : <recommandations moyen terme>\n\
Recommandations long terme : <recommandations long terme>\n\n\
Réponse :"
    )
}

/// Runs the two generation steps against a [`CompletionBackend`].
#[derive(Clone)]
pub struct Generator {
    backend: Arc<dyn CompletionBackend>,
    config: GenerationConfig,
}

impl Generator {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// Generate a preliminary diagnosis for `summary`.
    pub async fn diagnose(&self, summary: &StructuredSummary) -> ReportResult<String> {
        let prompt = diagnosis_prompt(&summary.to_prompt_block()?);
        Ok(self.generate("diagnosis", prompt).await?)
    }

    /// Generate recommendations for `summary`, given an already generated `diagnosis`.
    pub async fn recommend(
        &self,
        summary: &StructuredSummary,
        diagnosis: &str,
    ) -> ReportResult<String> {
        let prompt = recommendation_prompt(&summary.to_prompt_block()?, diagnosis);
        Ok(self.generate("recommendations", prompt).await?)
    }

    /// Send `prompt` and collect the full answer, retrying transient failures.
    ///
    /// Each attempt starts a fresh stream; text from a failed attempt is discarded. The
    /// generation timeout bounds the whole attempt, from opening the request to the final event.
    pub async fn generate(&self, step: &str, prompt: String) -> Result<String, GenerationError> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
        };
        let limits = StreamLimits {
            timeout: self.config.timeout,
            max_output_chars: self.config.max_output_chars,
        };

        tracing::info!("requesting {} from model {}", step, request.model);
        let backend = &self.backend;
        let request = &request;
        self.config
            .retry
            .run(
                step,
                || async move {
                    let attempt = async {
                        let stream = backend.open_stream(request).await?;
                        collect_fragments(stream, limits).await
                    };
                    tokio::time::timeout(limits.timeout, attempt)
                        .await
                        .map_err(|_| GenerationError::GenerationTimeout(limits.timeout))?
                },
                GenerationError::is_retryable,
            )
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use futures_util::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What a scripted backend does for one `open_stream` call.
    pub(crate) enum Script {
        Events(Vec<Result<StreamEvent, GenerationError>>),
        Fail(GenerationError),
        Hang,
        /// Never answers the request itself.
        HangOnOpen,
    }

    pub(crate) fn reply(text: &str) -> Script {
        let mut events: Vec<_> = text
            .split_inclusive(' ')
            .map(|word| Ok(StreamEvent::Fragment(word.to_string())))
            .collect();
        events.push(Ok(StreamEvent::Done));
        Script::Events(events)
    }

    /// Backend that plays back one script per call and records the prompts it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        scripts: Mutex<VecDeque<Script>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().expect("lock").len()
        }
    }

    #[async_trait::async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn open_stream(
            &self,
            request: &CompletionRequest,
        ) -> Result<EventStream, GenerationError> {
            self.prompts
                .lock()
                .expect("lock")
                .push(request.prompt.clone());
            let script = self
                .scripts
                .lock()
                .expect("lock")
                .pop_front()
                .expect("no script left for call");
            match script {
                Script::Events(events) => Ok(stream::iter(events).boxed()),
                Script::Fail(err) => Err(err),
                Script::Hang => Ok(stream::pending().boxed()),
                Script::HangOnOpen => {
                    futures_util::future::pending::<()>().await;
                    Err(GenerationError::IncompleteStream)
                }
            }
        }
    }

    pub(crate) fn test_config() -> GenerationConfig {
        let mut config = GenerationConfig::new("test-key");
        config.timeout = Duration::from_secs(5);
        config.retry = RetryPolicy::immediate(2);
        config
    }

    fn limits() -> StreamLimits {
        StreamLimits {
            timeout: Duration::from_secs(5),
            max_output_chars: 1_000,
        }
    }

    fn events(items: Vec<Result<StreamEvent, GenerationError>>) -> EventStream {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn fragments_are_joined_in_order() {
        let stream = events(vec![
            Ok(StreamEvent::Fragment("Diagnostic".into())),
            Ok(StreamEvent::Fragment(" : ".into())),
            Ok(StreamEvent::Fragment("hypertension".into())),
            Ok(StreamEvent::Done),
        ]);

        let text = collect_fragments(stream, limits()).await.expect("complete");
        assert_eq!(text, "Diagnostic : hypertension");
    }

    #[tokio::test]
    async fn events_after_done_are_ignored() {
        let stream = events(vec![
            Ok(StreamEvent::Fragment("ok".into())),
            Ok(StreamEvent::Done),
            Ok(StreamEvent::Fragment("late".into())),
        ]);
        assert_eq!(
            collect_fragments(stream, limits()).await.expect("complete"),
            "ok"
        );
    }

    #[tokio::test]
    async fn stream_without_done_is_incomplete() {
        let stream = events(vec![Ok(StreamEvent::Fragment("partial".into()))]);
        let err = collect_fragments(stream, limits()).await.expect_err("incomplete");
        assert!(matches!(err, GenerationError::IncompleteStream));
    }

    #[tokio::test]
    async fn empty_completed_stream_is_an_error() {
        let stream = events(vec![
            Ok(StreamEvent::Fragment("  ".into())),
            Ok(StreamEvent::Done),
        ]);
        let err = collect_fragments(stream, limits()).await.expect_err("empty");
        assert!(matches!(err, GenerationError::EmptyGeneration));

        let err = collect_fragments(events(vec![Ok(StreamEvent::Done)]), limits())
            .await
            .expect_err("empty");
        assert!(matches!(err, GenerationError::EmptyGeneration));
    }

    #[tokio::test]
    async fn mid_stream_error_discards_partial_text() {
        let stream = events(vec![
            Ok(StreamEvent::Fragment("Diagnostic : ".into())),
            Err(GenerationError::Unavailable("connection reset".into())),
        ]);
        let err = collect_fragments(stream, limits()).await.expect_err("error");
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }

    #[tokio::test]
    async fn output_is_bounded() {
        let stream = events(vec![
            Ok(StreamEvent::Fragment("x".repeat(600))),
            Ok(StreamEvent::Fragment("y".repeat(600))),
            Ok(StreamEvent::Done),
        ]);
        let err = collect_fragments(stream, limits()).await.expect_err("too long");
        assert!(matches!(
            err,
            GenerationError::OutputLimitExceeded { limit: 1_000 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stream_times_out() {
        let stream: EventStream = stream::pending().boxed();
        let err = collect_fragments(stream, limits()).await.expect_err("timeout");
        assert!(matches!(err, GenerationError::GenerationTimeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Script::Fail(GenerationError::Unavailable("503".into())),
            reply("Diagnostic : RAS"),
        ]));
        let generator = Generator::new(backend.clone(), test_config());

        let text = generator
            .generate("diagnosis", "prompt".into())
            .await
            .expect("second attempt succeeds");
        assert_eq!(text, "Diagnostic : RAS");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn authentication_failure_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::new(vec![Script::Fail(
            GenerationError::Authentication { status: 401 },
        )]));
        let generator = Generator::new(backend.clone(), test_config());

        let err = generator
            .generate("diagnosis", "prompt".into())
            .await
            .expect_err("auth failure");
        assert!(matches!(err, GenerationError::Authentication { status: 401 }));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::new(vec![Script::Hang]));
        let generator = Generator::new(backend.clone(), test_config());

        let err = generator
            .generate("diagnosis", "prompt".into())
            .await
            .expect_err("timeout");
        assert!(matches!(err, GenerationError::GenerationTimeout(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let backend = Arc::new(ScriptedBackend::new(vec![Script::HangOnOpen]));
        let generator = Generator::new(backend.clone(), test_config());

        let err = generator
            .generate("diagnosis", "prompt".into())
            .await
            .expect_err("timeout");
        assert!(matches!(err, GenerationError::GenerationTimeout(d) if d == Duration::from_secs(5)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn recommendation_prompt_embeds_summary_and_diagnosis() {
        let summary = crate::summary::build_summary(&crate::summary::tests::record("7", 45, 72))
            .expect("summary");
        let backend = Arc::new(ScriptedBackend::new(vec![reply(
            "Recommandations court terme : repos",
        )]));
        let generator = Generator::new(backend.clone(), test_config());

        generator
            .recommend(&summary, "Diagnostic : tachycardie légère")
            .await
            .expect("recommendations");

        let prompts = backend.prompts.lock().expect("lock");
        assert!(prompts[0].contains("\"heart_rate\": 72"));
        assert!(prompts[0].contains("Diagnostic :\nDiagnostic : tachycardie légère"));
        assert!(prompts[0].ends_with("Réponse :"));
    }
}
