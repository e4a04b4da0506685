use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    error::GenerationError,
    imagen::ImageGenerator,
    logger,
    models::{Credential, GeneratedImage, GenerationRequest, Prompt},
};

/// Where the session is in its generate cycle.
///
/// `Success` and `Failed` hold until the next accepted submission, which
/// always goes back through `Loading`. Images and an error can never coexist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Loading,
    Success(Vec<GeneratedImage>),
    Failed(String),
}

impl GenerationStatus {
    pub fn images(&self) -> &[GeneratedImage] {
        match self {
            GenerationStatus::Success(images) => images,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, GenerationStatus::Loading)
    }
}

/// Flat snapshot for rendering: the image grid, spinner, error banner and preview.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationState {
    pub images: Vec<GeneratedImage>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub selected: Option<GeneratedImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyPrompt,
    EmptyCredential,
    AlreadyLoading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Guard refused the submission; nothing changed and no call was made.
    Rejected(RejectReason),
    /// A call was made and the status is now `Success` or `Failed`.
    Completed,
}

#[derive(Debug, Default)]
struct Session {
    prompt_input: String,
    credential_input: String,
    status: GenerationStatus,
    /// Index into the images of a `Success` status.
    selected: Option<usize>,
}

impl Session {
    fn selected_image(&self) -> Option<&GeneratedImage> {
        self.selected.and_then(|index| self.status.images().get(index))
    }

    fn snapshot(&self) -> GenerationState {
        GenerationState {
            images: self.status.images().to_vec(),
            is_loading: self.status.is_loading(),
            error: match &self.status {
                GenerationStatus::Failed(message) => Some(message.clone()),
                _ => None,
            },
            selected: self.selected_image().cloned(),
        }
    }

    fn check_submit(
        &self,
        prompt: &str,
        credential: &str,
    ) -> Result<GenerationRequest, RejectReason> {
        if self.status.is_loading() {
            return Err(RejectReason::AlreadyLoading);
        }
        let prompt = Prompt::parse(prompt).ok_or(RejectReason::EmptyPrompt)?;
        let credential = Credential::parse(credential).ok_or(RejectReason::EmptyCredential)?;
        Ok(GenerationRequest::new(prompt, credential))
    }

    fn set_status(&mut self, status: GenerationStatus) {
        self.status = status;
        self.selected = None;
    }
}

/// Owns the generation session and drives the image client.
///
/// All methods take `&self`. The session lock is only held between await
/// points, so several `submit` futures on one task interleave the way UI
/// events do on a single-threaded loop, and the `Loading` guard is what
/// keeps them from overlapping.
pub struct GenerationController {
    client: Arc<dyn ImageGenerator>,
    session: Mutex<Session>,
}

impl GenerationController {
    pub fn new(client: Arc<dyn ImageGenerator>) -> Self {
        Self {
            client,
            session: Mutex::new(Session::default()),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // A poisoned session is still structurally valid.
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.session().prompt_input = prompt.into();
    }

    pub fn set_credential(&self, credential: impl Into<String>) {
        self.session().credential_input = credential.into();
    }

    pub fn prompt(&self) -> String {
        self.session().prompt_input.clone()
    }

    pub fn has_credential(&self) -> bool {
        !self.session().credential_input.trim().is_empty()
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        let session = self.session();
        let checked = session.check_submit(&session.prompt_input, &session.credential_input);
        checked.is_ok()
    }

    pub fn status(&self) -> GenerationStatus {
        self.session().status.clone()
    }

    pub fn state(&self) -> GenerationState {
        self.session().snapshot()
    }

    /// Submit `prompt` and `credential`. They replace the stored inputs only
    /// when the submission is accepted.
    pub async fn submit(
        &self,
        prompt: impl Into<String>,
        credential: impl Into<String>,
    ) -> SubmitOutcome {
        match self.begin(Some((prompt.into(), credential.into()))) {
            Ok(request) => self.run(request).await,
            Err(reason) => SubmitOutcome::Rejected(reason),
        }
    }

    /// Submit the current inputs.
    pub async fn generate(&self) -> SubmitOutcome {
        match self.begin(None) {
            Ok(request) => self.run(request).await,
            Err(reason) => SubmitOutcome::Rejected(reason),
        }
    }

    /// Apply the guard and, if it passes, enter `Loading`.
    /// A rejection leaves the session untouched.
    fn begin(
        &self,
        incoming: Option<(String, String)>,
    ) -> Result<GenerationRequest, RejectReason> {
        let mut session = self.session();
        let checked = match &incoming {
            Some((prompt, credential)) => session.check_submit(prompt, credential),
            None => session.check_submit(&session.prompt_input, &session.credential_input),
        };
        let request = checked.map_err(|reason| {
            log::debug!("Submission ignored: {:?}", reason);
            reason
        })?;

        if let Some((prompt, credential)) = incoming {
            session.prompt_input = prompt;
            session.credential_input = credential;
        }
        session.set_status(GenerationStatus::Loading);
        Ok(request)
    }

    async fn run(&self, request: GenerationRequest) -> SubmitOutcome {
        log::info!(
            "Generation {} started ({} chars of prompt)",
            request.request_id,
            request.prompt.as_str().chars().count()
        );
        let timer = logger::timer(&format!("generation {}", request.request_id));

        let result = self
            .client
            .generate(request.prompt.as_str(), request.credential.expose())
            .await;
        timer.stop();

        let status = match result {
            Ok(images) if images.is_empty() => {
                log::warn!("Generation {} produced no images", request.request_id);
                GenerationStatus::Failed(GenerationError::EmptyResult.to_string())
            }
            Ok(images) => {
                log::info!(
                    "Generation {} succeeded with {} images",
                    request.request_id,
                    images.len()
                );
                GenerationStatus::Success(images)
            }
            Err(err) => {
                if err.is_credential_problem() {
                    log::warn!("Generation {}: API key refused", request.request_id);
                } else {
                    log::error!("Generation {} failed: {:?}", request.request_id, err);
                }
                GenerationStatus::Failed(err.to_string())
            }
        };

        self.session().set_status(status);
        SubmitOutcome::Completed
    }

    /// Open the preview for the image at `index`. Returns false if there is no such image.
    pub fn select_image(&self, index: usize) -> bool {
        let mut session = self.session();
        if index < session.status.images().len() {
            session.selected = Some(index);
            true
        } else {
            false
        }
    }

    pub fn selected_image(&self) -> Option<GeneratedImage> {
        self.session().selected_image().cloned()
    }

    pub fn close_preview(&self) {
        self.session().selected = None;
    }

    /// Leave the preview so the prompt can be edited and resubmitted.
    /// Does not start a new generation.
    pub fn remix(&self) {
        self.session().selected = None;
        log::debug!("Remix requested; prompt kept for editing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CredentialProblem, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted results in order (the last one repeats) and records each call.
    struct ScriptedGenerator {
        results: Mutex<VecDeque<Result<Vec<GeneratedImage>>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGenerator {
        fn returning(result: Result<Vec<GeneratedImage>>) -> Arc<Self> {
            Self::sequence(vec![result])
        }

        fn sequence(results: Vec<Result<Vec<GeneratedImage>>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next_result(&self) -> Result<Vec<GeneratedImage>> {
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                results.pop_front().unwrap()
            } else {
                results.front().cloned().unwrap()
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, credential: &str) -> Result<Vec<GeneratedImage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), credential.to_string()));
            // Suspend once so concurrent submissions observe `Loading`.
            tokio::task::yield_now().await;
            self.next_result()
        }
    }

    fn images(count: usize) -> Vec<GeneratedImage> {
        (0..count)
            .map(|i| GeneratedImage::new(format!("img{}", i), "image/jpeg"))
            .collect()
    }

    fn controller(generator: &Arc<ScriptedGenerator>) -> GenerationController {
        GenerationController::new(generator.clone())
    }

    #[tokio::test]
    async fn test_four_images_scenario() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);

        let outcome = controller.submit("sunset beach", "k1").await;

        assert_eq!(outcome, SubmitOutcome::Completed);
        let state = controller.state();
        assert_eq!(state.images, images(4));
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_inputs_are_trimmed_before_the_call() {
        let generator = ScriptedGenerator::returning(Ok(images(1)));
        let controller = controller(&generator);

        controller.submit("  sunset beach \n", " k1 ").await;

        let seen = generator.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("sunset beach".to_string(), "k1".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_credential_never_calls_client() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);

        let outcome = controller.submit("sunset beach", "").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(RejectReason::EmptyCredential)
        );
        assert_eq!(generator.calls(), 0);
        assert_eq!(controller.status(), GenerationStatus::Idle);
        assert_eq!(controller.state(), GenerationState::default());
    }

    #[tokio::test]
    async fn test_whitespace_prompt_keeps_previous_result() {
        let generator = ScriptedGenerator::returning(Ok(images(2)));
        let controller = controller(&generator);
        controller.submit("forest", "k1").await;

        let outcome = controller.submit(" \t ", "k1").await;

        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::EmptyPrompt));
        assert_eq!(generator.calls(), 1);
        assert_eq!(controller.state().images, images(2));
    }

    #[tokio::test]
    async fn test_submit_while_loading_is_ignored() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.set_prompt("sunset beach");
        controller.set_credential("k1");

        let (first, second) = futures::join!(controller.generate(), controller.generate());

        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Rejected(RejectReason::AlreadyLoading));
        assert_eq!(generator.calls(), 1);
        assert_eq!(controller.state().images.len(), 4);
    }

    #[tokio::test]
    async fn test_submit_while_loading_keeps_running_inputs() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.set_prompt("first");
        controller.set_credential("k1");

        let (first, second) =
            futures::join!(controller.generate(), controller.submit("second", "k2"));

        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Rejected(RejectReason::AlreadyLoading));
        assert_eq!(controller.prompt(), "first");
        assert_eq!(generator.calls(), 1);

        // The next generate still uses the inputs of the accepted submission.
        controller.generate().await;
        let seen = generator.seen.lock().unwrap().clone();
        assert_eq!(seen[1], ("first".to_string(), "k1".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_submit_leaves_inputs_and_result() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.submit("sunset beach", "k1").await;
        let before = controller.state();

        let outcome = controller.submit("x", "").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(RejectReason::EmptyCredential)
        );
        assert_eq!(controller.prompt(), "sunset beach");
        assert!(controller.has_credential());
        assert_eq!(controller.state(), before);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_loading_disables_submit() {
        let generator = ScriptedGenerator::returning(Ok(images(1)));
        let controller = controller(&generator);
        controller.set_prompt("rain");
        controller.set_credential("k1");
        assert!(controller.can_submit());

        // Polled right after `generate` suspends inside the client call.
        let probe = async { (controller.can_submit(), controller.state().is_loading) };
        let (_, (enabled, loading)) = futures::join!(controller.generate(), probe);

        assert!(!enabled);
        assert!(loading);
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn test_rejected_key_scenario() {
        let generator = ScriptedGenerator::returning(Err(GenerationError::InvalidCredential(
            CredentialProblem::Rejected,
        )));
        let controller = controller(&generator);

        controller.submit("sunset beach", "bad").await;

        let state = controller.state();
        assert_eq!(
            state.error.as_deref(),
            Some("API 키가 유효하지 않습니다. 올바른 키를 입력했는지 확인해주세요.")
        );
        assert!(state.images.is_empty());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_empty_success_becomes_empty_result() {
        let generator = ScriptedGenerator::returning(Ok(Vec::new()));
        let controller = controller(&generator);

        controller.submit("void", "k1").await;

        assert_eq!(
            controller.status(),
            GenerationStatus::Failed(GenerationError::EmptyResult.to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_and_success_are_reentrant() {
        let generator = ScriptedGenerator::sequence(vec![
            Err(GenerationError::ServiceError("overloaded".to_string())),
            Ok(images(3)),
            Err(GenerationError::UnknownError),
        ]);
        let controller = controller(&generator);

        controller.submit("dunes", "k1").await;
        assert_eq!(
            controller.state().error.as_deref(),
            Some("이미지 생성 실패: overloaded")
        );

        assert_eq!(controller.generate().await, SubmitOutcome::Completed);
        let state = controller.state();
        assert_eq!(state.images.len(), 3);
        assert_eq!(state.error, None);

        assert_eq!(controller.generate().await, SubmitOutcome::Completed);
        let state = controller.state();
        assert!(state.images.is_empty());
        assert_eq!(
            state.error.as_deref(),
            Some("알 수 없는 오류로 인해 이미지 생성에 실패했습니다.")
        );
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_select_then_close_preview() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.submit("sunset beach", "k1").await;

        assert!(controller.select_image(2));
        assert_eq!(controller.selected_image(), Some(images(4)[2].clone()));
        assert_eq!(controller.state().selected, Some(images(4)[2].clone()));

        controller.close_preview();

        let state = controller.state();
        assert_eq!(state.selected, None);
        assert_eq!(state.images, images(4));
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_select_requires_existing_image() {
        let generator = ScriptedGenerator::returning(Ok(images(2)));
        let controller = controller(&generator);
        assert!(!controller.select_image(0));

        controller.submit("lake", "k1").await;
        assert!(!controller.select_image(2));
        assert_eq!(controller.selected_image(), None);
    }

    #[tokio::test]
    async fn test_remix_keeps_inputs_and_images() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.submit("sunset beach", "k1").await;
        controller.select_image(1);

        controller.remix();

        let state = controller.state();
        assert_eq!(state.selected, None);
        assert_eq!(state.images, images(4));
        assert_eq!(controller.prompt(), "sunset beach");
        assert!(controller.has_credential());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_new_submission_clears_selection() {
        let generator = ScriptedGenerator::returning(Ok(images(4)));
        let controller = controller(&generator);
        controller.submit("sunset beach", "k1").await;
        controller.select_image(3);

        controller.submit("sunrise beach", "k1").await;

        assert_eq!(controller.selected_image(), None);
    }
}
