use crux_core::testing::AppTester;

use shared::campaign::{DeliveryStatus, JobId};
use shared::capabilities::TimerOperation;
use shared::event::{ContactInput, SubmitPayload};
use shared::{App, Effect, Event, Model, DEFAULT_POLL_INTERVAL_MS};

fn payload(message: &str, contacts: &[(&str, &str)]) -> Event {
    Event::SubmitRequested(Box::new(SubmitPayload {
        message: message.into(),
        contacts: contacts
            .iter()
            .map(|(name, destination)| ContactInput {
                name: (*name).into(),
                destination: (*destination).into(),
            })
            .collect(),
    }))
}

fn timer_starts(effects: &[Effect]) -> Vec<TimerOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Timer(request) => match &request.operation {
                op @ TimerOperation::Start { .. } => Some(op.clone()),
                TimerOperation::Cancel { .. } => None,
            },
            _ => None,
        })
        .collect()
}

#[test]
fn batch_submission_creates_pending_jobs_and_schedules_timers() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    let update = app.update(
        payload(
            "Olá {{nome}}, sua encomenda chegou",
            &[
                ("Ana", "+5511999990001"),
                ("Bruno", "+5511999990002"),
                ("Carla", "+5511999990003"),
            ],
        ),
        &mut model,
    );

    assert_eq!(model.store.len(), 3);
    assert!(model.store.iter().all(|j| j.status == DeliveryStatus::Pending));

    let view = app.view(&model);
    assert_eq!(view.stats.total, 3);
    assert_eq!(view.stats.pending, 3);
    assert_eq!(view.stats.sent, 0);
    assert_eq!(view.stats.error, 0);

    // One delivery timer per job, plus a persist and a render.
    let starts = timer_starts(&update.effects);
    assert_eq!(starts.len(), 3);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Kv(_))));
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
}

#[test]
fn delivery_delays_fall_inside_configured_window() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    let update = app.update(payload("Oi {{nome}}", &[("Ana", "+5511999990001")]), &mut model);

    for op in timer_starts(&update.effects) {
        let TimerOperation::Start { millis, .. } = op else {
            unreachable!()
        };
        assert!(
            (model.delivery.delay_min_ms..=model.delivery.delay_max_ms).contains(&millis),
            "delay {millis} outside configured window"
        );
    }
}

#[test]
fn invalid_contact_rejects_the_whole_batch() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    let update = app.update(
        payload(
            "Oi {{nome}}",
            &[("Ana", "+5511999990001"), ("Bruno", "not-a-phone")],
        ),
        &mut model,
    );

    assert!(model.store.is_empty());
    assert!(timer_starts(&update.effects).is_empty());

    let view = app.view(&model);
    assert_eq!(view.stats.total, 0);
    let error = view.error.expect("rejected batch surfaces an error");
    assert_eq!(error.code, "validation");
}

#[test]
fn empty_message_rejects_the_whole_batch() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    let update = app.update(payload("   ", &[("Ana", "+5511999990001")]), &mut model);

    assert!(model.store.is_empty());
    assert!(timer_starts(&update.effects).is_empty());
    assert!(app.view(&model).error.is_some());
}

#[test]
fn delivery_fire_resolves_exactly_once() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    model.delivery.success_ratio = 1.0;

    app.update(payload("Oi {{nome}}", &[("Ana", "+5511999990001")]), &mut model);
    app.update(Event::DeliveryTimerFired { job_id: JobId(1) }, &mut model);

    assert_eq!(
        model.store.get(JobId(1)).unwrap().status,
        DeliveryStatus::Sent
    );
    let view = app.view(&model);
    assert_eq!(view.stats.sent, 1);
    assert_eq!(view.stats.pending, 0);

    // A duplicate fire must not flip the outcome, even with the odds inverted.
    model.delivery.success_ratio = 0.0;
    app.update(Event::DeliveryTimerFired { job_id: JobId(1) }, &mut model);

    assert_eq!(
        model.store.get(JobId(1)).unwrap().status,
        DeliveryStatus::Sent
    );
    assert_eq!(app.view(&model).stats.sent, 1);
}

#[test]
fn later_batch_does_not_change_an_in_flight_body() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    model.delivery.success_ratio = 1.0;

    app.update(
        payload("Primeira {{nome}}", &[("Ana", "+5511999990001")]),
        &mut model,
    );
    app.update(
        payload("Segunda {{nome}}", &[("Bruno", "+5511999990002")]),
        &mut model,
    );

    // The first job still carries the template it was submitted with.
    let first = model.store.get(JobId(1)).unwrap();
    assert_eq!(first.message, "Primeira {{nome}}");

    app.update(Event::DeliveryTimerFired { job_id: JobId(1) }, &mut model);

    let first = model.store.get(JobId(1)).unwrap();
    assert_eq!(first.status, DeliveryStatus::Sent);
    assert_eq!(first.message, "Primeira {{nome}}");
    assert_eq!(
        model.store.get(JobId(2)).unwrap().message,
        "Segunda {{nome}}"
    );
}

#[test]
fn failed_delivery_surfaces_only_as_status() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    model.delivery.success_ratio = 0.0;

    app.update(payload("Oi {{nome}}", &[("Ana", "+5511999990001")]), &mut model);
    app.update(Event::DeliveryTimerFired { job_id: JobId(1) }, &mut model);

    let view = app.view(&model);
    assert_eq!(view.stats.error, 1);
    assert_eq!(view.rows[0].status_label, "erro");
    // A failed simulated delivery is a row state, not an app error.
    assert!(view.error.is_none());
}

#[test]
fn clear_all_then_stale_fire_is_a_noop() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    app.update(
        payload(
            "Oi {{nome}}",
            &[("Ana", "+5511999990001"), ("Bruno", "+5511999990002")],
        ),
        &mut model,
    );
    app.update(Event::ClearAllRequested, &mut model);

    assert!(model.store.is_empty());
    let view = app.view(&model);
    assert_eq!(view.stats.total, 0);
    assert_eq!(view.toast.as_deref(), Some("Fila limpa"));

    // The delivery timers are still pending in the shell; their eventual
    // fire must change nothing and trigger no re-render.
    let update = app.update(Event::DeliveryTimerFired { job_id: JobId(1) }, &mut model);
    assert!(model.store.is_empty());
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
}

#[test]
fn clear_all_on_empty_queue_is_idempotent() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    app.update(Event::ClearAllRequested, &mut model);
    app.update(Event::ClearAllRequested, &mut model);

    assert!(model.store.is_empty());
    assert_eq!(app.view(&model).stats.total, 0);
}

#[test]
fn rows_come_newest_first() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    app.update(
        payload(
            "Oi {{nome}}",
            &[("Ana", "+5511999990001"), ("Bruno", "+5511999990002")],
        ),
        &mut model,
    );
    app.update(payload("Oi {{nome}}", &[("Carla", "+5511999990003")]), &mut model);

    let view = app.view(&model);
    let ids: Vec<u64> = view.rows.iter().map(|r| r.id).collect();
    assert_eq!(ids[0], 3, "latest job leads the table");
    assert!(ids.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn dashboard_polling_schedules_and_cancels_timers() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    let update = app.update(Event::DashboardOpened, &mut model);
    assert!(model.polling);
    let starts = timer_starts(&update.effects);
    assert_eq!(starts.len(), 1);
    assert!(matches!(
        starts[0],
        TimerOperation::Start { millis, .. } if millis == DEFAULT_POLL_INTERVAL_MS
    ));

    // A live tick re-renders and schedules the next one.
    let generation = model.poll_generation;
    let update = app.update(Event::PollTicked { generation }, &mut model);
    assert_eq!(timer_starts(&update.effects).len(), 1);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));

    // Closing cancels the pending timer.
    let update = app.update(Event::DashboardClosed, &mut model);
    assert!(!model.polling);
    let cancelled = update.effects.iter().any(|e| match e {
        Effect::Timer(request) => matches!(request.operation, TimerOperation::Cancel { .. }),
        _ => false,
    });
    assert!(cancelled);

    // A tick from the old generation must not reschedule or re-render.
    let update = app.update(Event::PollTicked { generation }, &mut model);
    assert!(timer_starts(&update.effects).is_empty());
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
}

#[test]
fn reopening_dashboard_replaces_the_poll_timer() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    app.update(Event::DashboardOpened, &mut model);
    let first_timer = model.poll_timer.expect("open schedules a poll timer");
    let stale_generation = model.poll_generation;

    // Reopening cancels the pending timer before scheduling the next.
    let update = app.update(Event::DashboardOpened, &mut model);
    let cancelled = update.effects.iter().any(|e| match e {
        Effect::Timer(request) => matches!(
            request.operation,
            TimerOperation::Cancel { id } if id == first_timer
        ),
        _ => false,
    });
    assert!(cancelled);
    assert_eq!(timer_starts(&update.effects).len(), 1);
    assert_ne!(model.poll_timer, Some(first_timer));

    // A tick from before the reopen is dropped.
    let update = app.update(
        Event::PollTicked {
            generation: stale_generation,
        },
        &mut model,
    );
    assert!(timer_starts(&update.effects).is_empty());
}

#[test]
fn store_restore_resumes_id_assignment() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    app.update(
        payload(
            "Oi {{nome}}",
            &[("Ana", "+5511999990001"), ("Bruno", "+5511999990002")],
        ),
        &mut model,
    );
    let snapshot = serde_json::to_vec(&model.store).unwrap();

    let mut restored = Model::default();
    app.update(
        Event::StoreRestored(shared::event::KvOutcome::Read(Some(snapshot))),
        &mut restored,
    );
    assert_eq!(restored.store.len(), 2);

    app.update(payload("Oi {{nome}}", &[("Carla", "+5511999990003")]), &mut restored);
    let newest = restored.store.jobs_newest_first();
    assert_eq!(newest[0].id, JobId(3), "ids never restart after a reload");
}
