use plate_gate::db;
use plate_gate::import;
use plate_gate::intake::{Intake, IntakeEvent, ASK_FIO, ASK_PHONE, ASK_PLATE, ASK_ROOM, CANCELLED};
use plate_gate::staging::StagingFile;

/// Feed a chat transcript, storing completed requests like the bot does.
async fn converse(intake: &mut Intake, staging: &StagingFile, chat_id: i64, lines: &[&str]) -> Vec<IntakeEvent> {
    let mut events = Vec::new();
    for line in lines {
        let event = intake.handle(chat_id, line);
        if let IntakeEvent::Completed(submission) = &event {
            staging.append(submission.clone()).await.unwrap();
        }
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_dialogue_request_reaches_whitelist_once() {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let staging = StagingFile::new(dir.path().join("car_data.json"));
    let mut intake = Intake::new();

    let events = converse(
        &mut intake,
        &staging,
        77,
        &["/start", "AB1234CD", "Ivan Petrov", "12", "+380501112233"],
    )
    .await;

    assert_eq!(events[0], IntakeEvent::Reply(ASK_PLATE));
    assert_eq!(events[1], IntakeEvent::Reply(ASK_FIO));
    assert_eq!(events[2], IntakeEvent::Reply(ASK_ROOM));
    assert_eq!(events[3], IntakeEvent::Reply(ASK_PHONE));
    assert!(matches!(events[4], IntakeEvent::Completed(_)));
    assert!(!intake.in_progress(77));

    let pending = import::pending(&pool, &staging).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].plates, "AB1234CD");
    assert_eq!(pending[0].fio, "Ivan Petrov");

    let ids: Vec<_> = pending.iter().map(|p| p.id).collect();
    import::commit(&pool, &staging, &ids).await.unwrap();
    import::commit(&pool, &staging, &ids).await.unwrap();

    let cars = db::cars::list_all(&pool).await.unwrap();
    assert_eq!(cars.len(), 1);
    assert_eq!(cars[0].phone, "+380501112233");
    assert!(import::pending(&pool, &staging).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_dialogue_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let staging = StagingFile::new(dir.path().join("car_data.json"));
    let mut intake = Intake::new();

    let events = converse(&mut intake, &staging, 5, &["/start", "AB1234CD", "/cancel", "Ivan"]).await;

    assert_eq!(events[2], IntakeEvent::Reply(CANCELLED));
    assert_eq!(events[3], IntakeEvent::Ignored);
    assert!(!staging.exists().await);
}
