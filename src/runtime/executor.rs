//! Call runtime executor

use super::traits::SessionStore;
use super::{CallError, CallUpdate};

use crate::engine::ConversationEngine;
use crate::session::{SessionUpdate, Speaker};
use crate::state_machine::{transition, CallContext, CallState, Effect, Event};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Runs one call: the single writer for its engine and session record
pub struct CallRuntime<S>
where
    S: SessionStore + Clone + 'static,
{
    context: CallContext,
    state: CallState,
    engine: ConversationEngine,
    store: S,
    event_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<CallUpdate>,
    /// Silence timer period; `None` leaves ticks to the caller
    tick_period: Option<Duration>,
}

impl<S> CallRuntime<S>
where
    S: SessionStore + Clone + 'static,
{
    pub fn new(
        context: CallContext,
        engine: ConversationEngine,
        store: S,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<CallUpdate>,
    ) -> Self {
        Self {
            context,
            state: CallState::Pending,
            engine,
            store,
            event_rx,
            broadcast_tx,
            tick_period: None,
        }
    }

    #[must_use]
    pub fn with_silence_timer(mut self, period: Option<Duration>) -> Self {
        self.tick_period = period;
        self
    }

    #[allow(dead_code)] // State query utility
    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting call runtime");

        let mut ticker = self.tick_period.map(silence_interval);

        // Process events in a loop until every handle is dropped
        loop {
            let listening = matches!(self.state, CallState::Active { .. });
            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    let caller_activity = match &event {
                        Event::StartCall => true,
                        Event::CallerUtterance { text } => !text.trim().is_empty(),
                        _ => false,
                    };
                    if let Err(e) = self.process_event(event).await {
                        tracing::warn!(session_id = %self.context.session_id, error = %e, "Event rejected");
                    } else if caller_activity {
                        if let Some(ticker) = ticker.as_mut() {
                            ticker.reset();
                        }
                    }
                }
                () = next_tick(&mut ticker), if listening => {
                    if let Err(e) = self.process_event(Event::SilenceTick).await {
                        tracing::warn!(session_id = %self.context.session_id, error = %e, "Silence tick failed");
                    }
                }
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Call runtime stopped");
    }

    /// Feed one event through the state machine and execute the effects,
    /// including any events the effects generate.
    ///
    /// If an effect fails the state reverts to where it was before `event`,
    /// so the call can still take further turns and silence ticks.
    pub async fn process_event(&mut self, event: Event) -> Result<(), CallError> {
        let before = self.state.clone();
        let result = self.run_event_chain(event).await;
        if let Err(CallError::Store(e)) = &result {
            tracing::warn!(
                session_id = %self.context.session_id,
                error = %e,
                state = ?before,
                "Effect failed, restoring previous state"
            );
            self.state = before;
            let _ = self.broadcast_tx.send(CallUpdate::Error {
                message: e.to_string(),
            });
        }
        result
    }

    async fn run_event_chain(&mut self, event: Event) -> Result<(), CallError> {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    // Transition errors are user-facing (e.g., "call has ended")
                    let _ = self.broadcast_tx.send(CallUpdate::Error {
                        message: e.to_string(),
                    });
                    return Err(e.into());
                }
            };

            let old_status = self.state.status();
            self.state = result.new_state;
            if self.state.status() != old_status {
                tracing::info!(
                    session_id = %self.context.session_id,
                    from = %old_status,
                    to = %self.state.status(),
                    "Call status changed"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await? {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, CallError> {
        let session_id = self.context.session_id.clone();

        match effect {
            Effect::SpeakOpening => {
                let opening = self.engine.produce_opening_statement();
                self.append_turn(Speaker::Assistant, &opening).await?;
                Ok(None)
            }

            Effect::AppendTurn { speaker, message } => {
                self.append_turn(speaker, &message).await?;
                Ok(None)
            }

            Effect::ConsultEngine { utterance } => {
                let session = self.store.get_session(&session_id).await?;
                let reply = self.engine.produce_reply(&utterance, &session.turns);
                let clarifications = self.engine.clarification_count();
                tracing::debug!(
                    session_id = %session_id,
                    clarifications,
                    transfer = ?reply.transfer,
                    "Engine decided"
                );

                // Mirror the counter so the record shows progress toward hand-off
                if clarifications != session.clarification_attempts {
                    self.store
                        .update_session(
                            &session_id,
                            SessionUpdate {
                                clarification_attempts: Some(clarifications),
                                ..SessionUpdate::default()
                            },
                        )
                        .await?;
                }

                Ok(Some(Event::AssistantReply { reply }))
            }

            Effect::StampStart => {
                self.store
                    .update_session(
                        &session_id,
                        SessionUpdate {
                            start_time: Some(Utc::now()),
                            ..SessionUpdate::default()
                        },
                    )
                    .await?;
                Ok(None)
            }

            Effect::StampEnd => {
                self.store
                    .update_session(
                        &session_id,
                        SessionUpdate {
                            end_time: Some(Utc::now()),
                            ..SessionUpdate::default()
                        },
                    )
                    .await?;
                Ok(None)
            }

            Effect::GenerateSummary => {
                let session = self.store.get_session(&session_id).await?;
                let summary = self
                    .engine
                    .produce_summary(&session.turns, session.duration_secs());
                self.store
                    .update_session(
                        &session_id,
                        SessionUpdate {
                            summary: Some(summary.clone()),
                            ..SessionUpdate::default()
                        },
                    )
                    .await?;
                let _ = self.broadcast_tx.send(CallUpdate::Summary { summary });
                Ok(None)
            }

            Effect::PersistState => {
                let mut update = SessionUpdate::status(self.state.status());
                match &self.state {
                    CallState::Transferred { reason } => {
                        tracing::info!(session_id = %session_id, reason = %reason, "Call transferred to Manohar");
                        update.transfer_reason = Some(*reason);
                    }
                    CallState::Failed { message } => {
                        tracing::error!(session_id = %session_id, error = %message, "Call failed");
                    }
                    _ => {}
                }
                self.store.update_session(&session_id, update).await?;

                let transfer_reason = match &self.state {
                    CallState::Transferred { reason } => Some(*reason),
                    _ => None,
                };
                let _ = self.broadcast_tx.send(CallUpdate::Status {
                    status: self.state.status(),
                    transfer_reason,
                });
                Ok(None)
            }

            Effect::NotifySilence { elapsed, threshold } => {
                let _ = self
                    .broadcast_tx
                    .send(CallUpdate::Silence { elapsed, threshold });
                Ok(None)
            }
        }
    }

    async fn append_turn(&self, speaker: Speaker, message: &str) -> Result<(), CallError> {
        let turn = self
            .store
            .append_turn(&self.context.session_id, speaker, message)
            .await?;
        let _ = self.broadcast_tx.send(CallUpdate::Turn { turn });
        Ok(())
    }
}

fn silence_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Wait for the next timer tick, or forever when the timer is disabled
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
