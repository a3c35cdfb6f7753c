//! Broadcast coordinator.
//!
//! Runs one chat attempt through the pipeline:
//!
//! ```text
//! Received -> PreHookEvaluated -> PermissionChecked -> FormatResolved
//!          -> Built -> Dispatching -> Done(outcome)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use super::policy::{
    strip_colors, ChatAttempt, ChatOutcome, ChatPolicy, DenyReason, COLOR_PERMISSION,
    RECEIVE_PERMISSION, SEND_PERMISSION,
};
use crate::config::Config;
use crate::format::{ChatFormat, FormatContexts, FormatRegistry};
use crate::hooks::{
    HookBus, HookDecision, HookError, MessageFormedEvent, PreChatEvent, RecipientEvent,
};
use crate::message::MessageBuilder;
use crate::participant::{DeliverySink, MetadataStore, Participant, ParticipantRef};
use crate::placeholder::PlaceholderRegistry;
use crate::text::{LegacyRenderer, StructuredText};
use crate::Result;

/// Drives chat attempts from input to delivery.
pub struct BroadcastCoordinator {
    pub(super) formats: FormatRegistry,
    policy: RwLock<Arc<ChatPolicy>>,
    pub(super) builder: MessageBuilder,
    pub(super) sink: Arc<dyn DeliverySink>,
    pub(super) metadata: Arc<dyn MetadataStore>,
    hooks: HookBus,
}

impl BroadcastCoordinator {
    /// Create a coordinator from prepared parts.
    pub fn new(
        formats: FormatContexts,
        policy: ChatPolicy,
        builder: MessageBuilder,
        sink: Arc<dyn DeliverySink>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            formats: FormatRegistry::new(formats),
            policy: RwLock::new(Arc::new(policy)),
            builder,
            sink,
            metadata,
            hooks: HookBus::new(),
        }
    }

    /// Create a coordinator from configuration.
    ///
    /// Uses the legacy renderer with the configured link style.
    pub fn from_config(
        config: &Config,
        placeholders: Arc<PlaceholderRegistry>,
        sink: Arc<dyn DeliverySink>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let renderer = LegacyRenderer::with_link_style(config.link_style.to_style()?);
        let policy = ChatPolicy::from_config(config, &renderer)?;
        let formats = config.to_format_contexts()?;
        formats.validate_markup(&renderer)?;
        let builder = MessageBuilder::new(placeholders, Arc::new(renderer));
        Ok(Self::new(formats, policy, builder, sink, metadata))
    }

    /// Get the hook bus.
    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    /// Get the format registry.
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Get the message builder.
    pub fn builder(&self) -> &MessageBuilder {
        &self.builder
    }

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<ChatPolicy> {
        self.policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a new configuration.
    ///
    /// Formats and policy are built completely before either is swapped in.
    /// On error nothing changes. The renderer is kept.
    pub fn reload(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let formats = config.to_format_contexts()?;
        formats.validate_markup(self.builder.renderer().as_ref())?;
        let policy = ChatPolicy::from_config(config, self.builder.renderer().as_ref())?;

        let contexts = formats.context_names().len();
        self.formats.replace(formats);
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(policy);
        info!(contexts, "configuration reloaded");
        Ok(())
    }

    /// Process one chat message from `sender`.
    pub async fn handle_chat(&self, sender: &ParticipantRef, raw: &str) -> ChatAttempt {
        let mut attempt = ChatAttempt::new(sender.id(), raw);
        let policy = self.policy();
        debug!(sender = %sender.id(), "chat received");

        let event = PreChatEvent {
            sender: sender.clone(),
            message: raw.to_string(),
        };
        match self.hooks.fire_pre_chat(&event).await {
            Ok(HookDecision::Allow) => {}
            Ok(HookDecision::Deny) => {
                return done(attempt, ChatOutcome::Denied(DenyReason::HookVeto))
            }
            Err(e) => return hook_failed(attempt, e),
        }

        if policy.require_send && !sender.has_permission(SEND_PERMISSION) {
            if policy.permission_passthrough {
                return done(attempt, ChatOutcome::Passthrough);
            }
            if let Some(message) = &policy.send_fail {
                self.sink.send(sender.as_ref(), message).await;
            }
            return done(
                attempt,
                ChatOutcome::Denied(DenyReason::MissingSendPermission),
            );
        }

        let Some(format) = self.formats.select_format(sender.as_ref(), None) else {
            let outcome = if policy.passthrough {
                ChatOutcome::Passthrough
            } else {
                ChatOutcome::Denied(DenyReason::NoFormat)
            };
            return done(attempt, outcome);
        };
        debug!(sender = %sender.id(), format = format.id(), "format resolved");
        attempt.format = Some(format.clone());

        let body = if sender.has_permission(COLOR_PERMISSION) {
            raw.to_string()
        } else {
            strip_colors(raw)
        };
        let echo_body = format!("{}{}", policy.echo_prefix, body);

        let built = self
            .render(sender.as_ref(), &format, &body, None, &policy)
            .zip(self.render(sender.as_ref(), &format, &echo_body, None, &policy));
        let Some((message, echo)) = built else {
            return done(attempt, ChatOutcome::Denied(DenyReason::RenderFailure));
        };

        let event = MessageFormedEvent {
            sender: sender.clone(),
            format: format.clone(),
            raw_message: body.clone(),
            message: message.clone(),
        };
        if let Err(e) = self.hooks.fire_message_formed(&event).await {
            return hook_failed(attempt, e);
        }

        if policy.log_chat_global {
            info!(
                target: "gchat::chat",
                sender = sender.username(),
                format = format.id(),
                "{}",
                self.builder.plain_text(&message)
            );
        }

        // All verdicts are in before the first send.
        let mut allowed = Vec::new();
        for recipient in self.sink.participants().await {
            let cancelled = policy.require_receive && !recipient.has_permission(RECEIVE_PERMISSION);
            let mut event = RecipientEvent::new(
                sender.clone(),
                recipient.clone(),
                format.clone(),
                body.clone(),
                cancelled,
            );
            if let Err(e) = self.hooks.fire_recipient(&mut event).await {
                return hook_failed(attempt, e);
            }
            attempt.decisions.insert(recipient.id(), !event.is_cancelled());
            if !event.is_cancelled() {
                allowed.push(recipient);
            }
        }

        let mut delivered = 0;
        for recipient in allowed {
            let text = if recipient.id() == sender.id() {
                &echo
            } else {
                &message
            };
            if self.sink.send(recipient.as_ref(), text).await {
                delivered += 1;
            }
        }
        done(attempt, ChatOutcome::Delivered { recipients: delivered })
    }

    /// Build a message, falling back to plain text when allowed.
    pub(super) fn render(
        &self,
        participant: &dyn Participant,
        format: &ChatFormat,
        body: &str,
        params: Option<&HashMap<String, String>>,
        policy: &ChatPolicy,
    ) -> Option<StructuredText> {
        match self.builder.build(participant, format, body, params) {
            Ok(text) => Some(text),
            Err(e) if policy.plain_text_fallback => {
                warn!(format = format.id(), error = %e, "render failed, sending plain text");
                Some(self.builder.build_plain(participant, format, body, params))
            }
            Err(e) => {
                warn!(format = format.id(), error = %e, "render failed");
                None
            }
        }
    }

    /// Send a message to every connected participant.
    pub(super) async fn broadcast(&self, text: &StructuredText) -> usize {
        let mut delivered = 0;
        for recipient in self.sink.participants().await {
            if self.sink.send(recipient.as_ref(), text).await {
                delivered += 1;
            }
        }
        delivered
    }
}

fn done(attempt: ChatAttempt, outcome: ChatOutcome) -> ChatAttempt {
    debug!(sender = %attempt.sender, ?outcome, "chat attempt finished");
    attempt.finish(outcome)
}

fn hook_failed(attempt: ChatAttempt, err: HookError) -> ChatAttempt {
    error!(sender = %attempt.sender, error = %err, "hook failed, dropping message");
    done(attempt, ChatOutcome::Denied(DenyReason::HookFailure))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::format::{FormatSet, CHAT_CONTEXT};
    use crate::participant::{BasicParticipant, MemoryMetadataStore, SessionRegistry};
    use crate::placeholder::StandardPlaceholders;
    use crate::text::{RenderError, Renderer, TextColor, TextNode};

    struct Setup {
        coordinator: BroadcastCoordinator,
        sessions: Arc<SessionRegistry>,
    }

    fn setup(formats: Vec<ChatFormat>, policy: ChatPolicy) -> Setup {
        setup_with(formats, policy, Arc::new(LegacyRenderer::new()))
    }

    fn setup_with(
        formats: Vec<ChatFormat>,
        policy: ChatPolicy,
        renderer: Arc<dyn Renderer>,
    ) -> Setup {
        let sessions = Arc::new(SessionRegistry::new());
        let metadata: Arc<MemoryMetadataStore> = Arc::new(MemoryMetadataStore::new());
        let placeholders = PlaceholderRegistry::new();
        placeholders.register(Arc::new(StandardPlaceholders::new(metadata.clone())));
        let builder = MessageBuilder::new(Arc::new(placeholders), renderer);
        let contexts =
            FormatContexts::new().with_context(CHAT_CONTEXT, FormatSet::new(formats).unwrap());

        Setup {
            coordinator: BroadcastCoordinator::new(
                contexts,
                policy,
                builder,
                sessions.clone(),
                metadata,
            ),
            sessions,
        }
    }

    fn default_format() -> ChatFormat {
        ChatFormat::new("default", 0, false, "&7{username}&f: {message}")
    }

    async fn join(
        sessions: &SessionRegistry,
        participant: BasicParticipant,
    ) -> (ParticipantRef, UnboundedReceiver<StructuredText>) {
        let participant = participant.into_ref();
        let inbox = sessions.connect(participant.clone()).await.unwrap();
        (participant, inbox)
    }

    struct Deny;

    #[async_trait]
    impl crate::hooks::PreChatHook for Deny {
        async fn before_chat(
            &self,
            _event: &PreChatEvent,
        ) -> std::result::Result<HookDecision, HookError> {
            Ok(HookDecision::Deny)
        }
    }

    /// Fails on markup the legacy renderer would keep as text.
    struct StrictRenderer(LegacyRenderer);

    impl Renderer for StrictRenderer {
        fn parse(&self, markup: &str) -> std::result::Result<TextNode, RenderError> {
            self.0.validate(markup)?;
            self.0.parse(markup)
        }
    }

    struct FailingPreChat;

    #[async_trait]
    impl crate::hooks::PreChatHook for FailingPreChat {
        async fn before_chat(
            &self,
            _event: &PreChatEvent,
        ) -> std::result::Result<HookDecision, HookError> {
            Err(HookError::new("antispam", "backend offline"))
        }
    }

    struct FailingObserver;

    #[async_trait]
    impl crate::hooks::MessageFormedHook for FailingObserver {
        async fn message_formed(
            &self,
            _event: &MessageFormedEvent,
        ) -> std::result::Result<(), HookError> {
            Err(HookError::new("audit", "disk full"))
        }
    }

    struct Seen(Mutex<Vec<String>>);

    #[async_trait]
    impl crate::hooks::MessageFormedHook for Seen {
        async fn message_formed(
            &self,
            event: &MessageFormedEvent,
        ) -> std::result::Result<(), HookError> {
            self.0.lock().unwrap().push(event.raw_message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chat_delivered_with_echo() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (_bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;

        let attempt = coordinator.handle_chat(&ann, "hello").await;

        assert_eq!(attempt.outcome, ChatOutcome::Delivered { recipients: 2 });
        assert_eq!(attempt.format.unwrap().id(), "default");

        let to_bob = bob_inbox.try_recv().unwrap();
        let to_ann = ann_inbox.try_recv().unwrap();
        assert_eq!(to_bob.plain_text(), "Ann: hello");
        assert_eq!(to_ann.plain_text(), "Ann: hello");
        assert_eq!(
            to_ann.leaves().last().unwrap().style.color,
            Some(TextColor::Aqua)
        );
        assert_eq!(
            to_bob.leaves().last().unwrap().style.color,
            Some(TextColor::White)
        );
    }

    #[tokio::test]
    async fn test_pre_hook_veto() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        coordinator.hooks().register_pre_chat(Arc::new(Deny));

        let attempt = coordinator.handle_chat(&ann, "hello").await;

        assert_eq!(attempt.outcome, ChatOutcome::Denied(DenyReason::HookVeto));
        assert!(attempt.format.is_none());
        assert!(ann_inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_colors_stripped_without_permission() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let seen = Arc::new(Seen(Mutex::new(Vec::new())));
        coordinator.hooks().register_message_formed(seen.clone());
        let (ann, _ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (artist, _artist_inbox) = join(
            &sessions,
            BasicParticipant::new("Cid").with_permission(COLOR_PERMISSION),
        )
        .await;

        coordinator.handle_chat(&ann, "&chello").await;
        coordinator.handle_chat(&artist, "&chello").await;

        assert_eq!(
            *seen.0.lock().unwrap(),
            vec!["hello".to_string(), "&chello".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hex_colors_stripped_without_permission() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, _ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (artist, _artist_inbox) = join(
            &sessions,
            BasicParticipant::new("Cid").with_permission(COLOR_PERMISSION),
        )
        .await;
        let (_bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;

        let attempt = coordinator.handle_chat(&ann, "&#ff0000red").await;
        assert!(attempt.outcome.is_delivered());
        let plain = bob_inbox.try_recv().unwrap();
        assert_eq!(plain.plain_text(), "Ann: red");
        assert!(plain
            .leaves()
            .iter()
            .all(|leaf| !matches!(leaf.style.color, Some(TextColor::Rgb(..)))));

        coordinator.handle_chat(&artist, "&#ff0000red").await;
        let colored = bob_inbox.try_recv().unwrap();
        assert_eq!(
            colored.leaves().last().unwrap().style.color,
            Some(TextColor::Rgb(255, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_malformed_hex_in_body_renders_normally() {
        let policy = ChatPolicy {
            plain_text_fallback: false,
            ..ChatPolicy::default()
        };
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], policy);
        let (ann, _ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (_bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;

        let attempt = coordinator.handle_chat(&ann, "price &#1 each").await;

        assert_eq!(attempt.outcome, ChatOutcome::Delivered { recipients: 2 });
        let to_bob = bob_inbox.try_recv().unwrap();
        assert_eq!(to_bob.plain_text(), "Ann: price &#1 each");
        assert_eq!(to_bob.leaves()[0].style.color, Some(TextColor::Gray));
    }

    #[tokio::test]
    async fn test_pre_hook_failure_delivers_nothing() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (_bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;
        coordinator.hooks().register_pre_chat(Arc::new(FailingPreChat));

        let attempt = coordinator.handle_chat(&ann, "hello").await;

        assert_eq!(attempt.outcome, ChatOutcome::Denied(DenyReason::HookFailure));
        assert!(attempt.format.is_none());
        assert!(ann_inbox.try_recv().is_err());
        assert!(bob_inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_formed_hook_failure_delivers_nothing() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;
        coordinator
            .hooks()
            .register_message_formed(Arc::new(FailingObserver));

        let attempt = coordinator.handle_chat(&ann, "hello").await;

        assert_eq!(attempt.outcome, ChatOutcome::Denied(DenyReason::HookFailure));
        assert_eq!(attempt.format.as_ref().unwrap().id(), "default");
        assert_eq!(attempt.allowed(bob.id()), None);
        assert!(ann_inbox.try_recv().is_err());
        assert!(bob_inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_format_passthrough_and_deny() {
        let gated = ChatFormat::new("vip", 10, true, "{message}");

        let Setup {
            coordinator,
            sessions,
        } = setup(vec![gated.clone()], ChatPolicy::default());
        let (ann, _inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        assert!(coordinator.handle_chat(&ann, "hi").await.outcome.is_passthrough());

        let policy = ChatPolicy {
            passthrough: false,
            ..ChatPolicy::default()
        };
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![gated], policy);
        let (ann, _inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        assert_eq!(
            coordinator.handle_chat(&ann, "hi").await.outcome,
            ChatOutcome::Denied(DenyReason::NoFormat)
        );
    }

    #[tokio::test]
    async fn test_render_failure_without_fallback() {
        let policy = ChatPolicy {
            plain_text_fallback: false,
            ..ChatPolicy::default()
        };
        let broken = ChatFormat::new("broken", 0, false, "&#12{message}");
        let Setup {
            coordinator,
            sessions,
        } = setup_with(
            vec![broken],
            policy,
            Arc::new(StrictRenderer(LegacyRenderer::new())),
        );
        let (ann, mut inbox) = join(&sessions, BasicParticipant::new("Ann")).await;

        let attempt = coordinator.handle_chat(&ann, "hi").await;
        assert_eq!(attempt.outcome, ChatOutcome::Denied(DenyReason::RenderFailure));
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_render_failure_with_fallback() {
        let broken = ChatFormat::new("broken", 0, false, "&#12{message}");
        let Setup {
            coordinator,
            sessions,
        } = setup_with(
            vec![broken],
            ChatPolicy::default(),
            Arc::new(StrictRenderer(LegacyRenderer::new())),
        );
        let (ann, _ann_inbox) = join(&sessions, BasicParticipant::new("Ann")).await;
        let (_bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;

        let attempt = coordinator.handle_chat(&ann, "hi").await;
        assert!(attempt.outcome.is_delivered());
        assert_eq!(bob_inbox.try_recv().unwrap().plain_text(), "&#12hi");
    }

    #[tokio::test]
    async fn test_receive_permission_required() {
        let policy = ChatPolicy {
            require_receive: true,
            ..ChatPolicy::default()
        };
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], policy);
        let (ann, _ann_inbox) = join(
            &sessions,
            BasicParticipant::new("Ann").with_permission(RECEIVE_PERMISSION),
        )
        .await;
        let (bob, mut bob_inbox) = join(&sessions, BasicParticipant::new("Bob")).await;

        let attempt = coordinator.handle_chat(&ann, "hello").await;

        assert_eq!(attempt.outcome, ChatOutcome::Delivered { recipients: 1 });
        assert_eq!(attempt.allowed(bob.id()), Some(false));
        assert_eq!(attempt.allowed(ann.id()), Some(true));
        assert!(bob_inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reload_swaps_formats_and_policy() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut inbox) = join(&sessions, BasicParticipant::new("Ann")).await;

        let config = Config::parse(
            r#"
[chat]
echo_prefix = ""

[require_permission]
send_fail = ""

[formats.plain]
check_permission = false
format = "<{username}> {message}"
"#,
        )
        .unwrap();
        coordinator.reload(&config).unwrap();

        coordinator.handle_chat(&ann, "hi").await;
        assert_eq!(inbox.try_recv().unwrap().plain_text(), "<Ann> hi");
        assert_eq!(coordinator.policy().echo_prefix, "");
    }

    #[tokio::test]
    async fn test_reload_rejected_keeps_previous() {
        let Setup {
            coordinator,
            sessions,
        } = setup(vec![default_format()], ChatPolicy::default());
        let (ann, mut inbox) = join(&sessions, BasicParticipant::new("Ann")).await;

        let mut config = Config::default();
        config.require_permission.send_fail = "&#nothex".to_string();
        assert!(coordinator.reload(&config).is_err());

        let config = Config::parse(
            r#"
[require_permission]
send_fail = ""

[formats.broken]
check_permission = false
format = "&#12{username}: {message}"
"#,
        )
        .unwrap();
        assert!(matches!(
            coordinator.reload(&config),
            Err(crate::GChatError::Render(_))
        ));

        coordinator.handle_chat(&ann, "hi").await;
        assert_eq!(inbox.try_recv().unwrap().plain_text(), "Ann: hi");
    }
}
