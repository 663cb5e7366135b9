//! Rooms, beds, campaigns and occupancies against a real database.

use crou_core::housing::{
    bed_labels, ApplicationStatus, BedStatus, CampaignStatus, Gender, RoomGender,
};
use crou_core::status::StatusEnum;
use crou_core::tenant::TenantType;
use crou_db::models::housing::{CreateApplication, CreateCampaign, CreateRoom, UpdateRoom};
use crou_db::models::tenant::CreateTenant;
use crou_db::repositories::{ApplicationRepo, CampaignRepo, OccupancyRepo, RoomRepo, TenantRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn crou_tenant(pool: &PgPool) -> i64 {
    let ministry = TenantRepo::create(
        pool,
        &CreateTenant {
            code: "MESR".to_string(),
            name: "Ministere".to_string(),
            tenant_type: TenantType::Ministere,
            parent_id: None,
            parent_path: None,
            service_type: None,
        },
    )
    .await
    .unwrap();
    let region = TenantRepo::create(
        pool,
        &CreateTenant {
            code: "REG-NY".to_string(),
            name: "Niamey".to_string(),
            tenant_type: TenantType::Region,
            parent_id: Some(ministry.id),
            parent_path: Some(ministry.path.clone()),
            service_type: None,
        },
    )
    .await
    .unwrap();
    TenantRepo::create(
        pool,
        &CreateTenant {
            code: "CROU-NY".to_string(),
            name: "CROU de Niamey".to_string(),
            tenant_type: TenantType::Crou,
            parent_id: Some(region.id),
            parent_path: Some(region.path.clone()),
            service_type: Some("housing".to_string()),
        },
    )
    .await
    .unwrap()
    .id
}

fn new_room(tenant_id: i64, number: &str, capacity: i32) -> CreateRoom {
    CreateRoom {
        tenant_id,
        residence: "Cite Universitaire".to_string(),
        number: number.to_string(),
        floor: Some(1),
        capacity,
        gender: RoomGender::Mixed,
    }
}

fn unchanged_room() -> UpdateRoom {
    UpdateRoom {
        residence: None,
        floor: None,
        capacity: None,
        gender: None,
        is_active: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_room_created_with_labelled_beds(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;

    let (room, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "101", 3), &bed_labels(0, 3))
        .await
        .unwrap();
    assert_eq!(room.capacity, 3);
    let labels: Vec<_> = beds.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, ["A", "B", "C"]);
    assert!(beds.iter().all(|b| b.status_id == BedStatus::Available.id()));

    let free = RoomRepo::free_beds(&pool, tenant_id).await.unwrap();
    assert_eq!(free.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_capacity_shrink_removes_highest_free_labels(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;
    let (room, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "102", 4), &bed_labels(0, 4))
        .await
        .unwrap();

    // Bed A goes into maintenance and must survive the shrink.
    RoomRepo::set_bed_status(&pool, beds[0].id, BedStatus::Available, BedStatus::Maintenance)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(RoomRepo::count_beds_in_use(&pool, room.id).await.unwrap(), 1);

    let update = UpdateRoom {
        capacity: Some(2),
        ..unchanged_room()
    };
    RoomRepo::update(&pool, room.id, &update, &[], 2).await.unwrap().unwrap();

    let remaining = RoomRepo::beds(&pool, room.id).await.unwrap();
    let labels: Vec<_> = remaining.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, ["A", "B"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bed_status_change_is_conditional(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;
    let (_, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "103", 1), &bed_labels(0, 1))
        .await
        .unwrap();

    let first = RoomRepo::set_bed_status(&pool, beds[0].id, BedStatus::Available, BedStatus::Occupied)
        .await
        .unwrap();
    assert!(first.is_some());
    let second = RoomRepo::set_bed_status(&pool, beds[0].id, BedStatus::Available, BedStatus::Occupied)
        .await
        .unwrap();
    assert!(second.is_none(), "a bed cannot be taken twice");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_campaign_processing_counters(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;
    let (_, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "201", 2), &bed_labels(0, 2))
        .await
        .unwrap();

    let campaign = CampaignRepo::create(
        &pool,
        &CreateCampaign {
            tenant_id,
            name: "Rentree 2026".to_string(),
            academic_year: "2026-2027".to_string(),
            starts_on: None,
            ends_on: None,
            created_by: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(campaign.status().unwrap(), CampaignStatus::Draft);

    CampaignRepo::transition(&pool, campaign.id, CampaignStatus::Draft, CampaignStatus::Open, None, None)
        .await
        .unwrap()
        .unwrap();

    let mut applications = Vec::new();
    for (i, gender) in [Gender::Female, Gender::Male, Gender::Female].into_iter().enumerate() {
        let app = ApplicationRepo::create(
            &pool,
            &CreateApplication {
                campaign_id: campaign.id,
                student_ref: format!("ETU-{i}"),
                student_name: format!("Etudiant {i}"),
                gender,
                priority_score: 10 - i as i32,
                preferred_residence: None,
            },
        )
        .await
        .unwrap();
        applications.push(app);
    }
    assert_eq!(ApplicationRepo::pending(&pool, campaign.id).await.unwrap().len(), 3);

    CampaignRepo::transition(&pool, campaign.id, CampaignStatus::Open, CampaignStatus::Closed, None, None)
        .await
        .unwrap()
        .unwrap();
    let processing = CampaignRepo::transition(
        &pool,
        campaign.id,
        CampaignStatus::Closed,
        CampaignStatus::Processing,
        Some(3),
        None,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(processing.total_to_process, 3);
    assert!(processing.processing_started_at.is_some());

    // A concurrent second start loses the race.
    let again = CampaignRepo::transition(
        &pool,
        campaign.id,
        CampaignStatus::Closed,
        CampaignStatus::Processing,
        Some(3),
        None,
    )
    .await
    .unwrap();
    assert!(again.is_none());

    let mut tx = pool.begin().await.unwrap();
    for (app, bed) in applications.iter().zip(&beds) {
        RoomRepo::set_bed_status(&mut *tx, bed.id, BedStatus::Available, BedStatus::Occupied)
            .await
            .unwrap()
            .unwrap();
        assert!(ApplicationRepo::mark_assigned(&mut tx, app.id, bed.id).await.unwrap());
        OccupancyRepo::create(&mut tx, bed.id, Some(app.id), &app.student_ref, &app.student_name)
            .await
            .unwrap();
    }
    assert!(ApplicationRepo::mark_unassigned(&mut tx, applications[2].id, "no_compatible_bed")
        .await
        .unwrap());
    CampaignRepo::add_progress(&mut tx, campaign.id, 2, 1).await.unwrap();
    tx.commit().await.unwrap();

    let done = CampaignRepo::transition(
        &pool,
        campaign.id,
        CampaignStatus::Processing,
        CampaignStatus::Completed,
        None,
        None,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(done.processed_count, 3);
    assert_eq!(done.assigned_count, 2);
    assert_eq!(done.unassigned_count, 1);
    assert!(done.processing_finished_at.is_some());

    let report = CampaignRepo::report(&pool, campaign.id).await.unwrap();
    assert_eq!(report.total_applications, 3);
    assert_eq!(report.assigned, 2);
    assert_eq!(report.unassigned, 1);
    assert_eq!(report.assignment_rate, 66.7);
    assert_eq!(report.by_residence.len(), 1);
    assert_eq!(report.by_residence[0].assigned, 2);

    let unassigned = ApplicationRepo::list(
        &pool,
        campaign.id,
        Some(ApplicationStatus::Unassigned),
        10,
        0,
    )
    .await
    .unwrap();
    assert_eq!(unassigned[0].unassigned_reason.as_deref(), Some("no_compatible_bed"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ending_occupancy_frees_the_bed(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;
    let (_, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "301", 1), &bed_labels(0, 1))
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    RoomRepo::set_bed_status(&mut *tx, beds[0].id, BedStatus::Available, BedStatus::Occupied)
        .await
        .unwrap()
        .unwrap();
    let occupancy = OccupancyRepo::create(&mut tx, beds[0].id, None, "ETU-9", "Hadiza")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(OccupancyRepo::tenant_of(&pool, occupancy.id).await.unwrap(), Some(tenant_id));

    let ended = OccupancyRepo::end(&pool, occupancy.id).await.unwrap().unwrap();
    assert!(ended.end_date.is_some());
    assert!(OccupancyRepo::end(&pool, occupancy.id).await.unwrap().is_none());

    let bed = RoomRepo::find_bed(&pool, beds[0].id).await.unwrap().unwrap();
    assert_eq!(bed.status_id, BedStatus::Available.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_beds_with_history_survive_shrink(pool: PgPool) {
    let tenant_id = crou_tenant(&pool).await;
    let (room, beds) = RoomRepo::create(&pool, &new_room(tenant_id, "302", 2), &bed_labels(0, 2))
        .await
        .unwrap();
    assert!(!RoomRepo::has_occupancy_history(&pool, room.id).await.unwrap());

    // Bed B, the first a shrink would pick, held a student who has left.
    let mut tx = pool.begin().await.unwrap();
    RoomRepo::set_bed_status(&mut *tx, beds[1].id, BedStatus::Available, BedStatus::Occupied)
        .await
        .unwrap()
        .unwrap();
    let occupancy = OccupancyRepo::create(&mut tx, beds[1].id, None, "ETU-7", "Issa")
        .await
        .unwrap();
    tx.commit().await.unwrap();
    OccupancyRepo::end(&pool, occupancy.id).await.unwrap().unwrap();

    assert!(RoomRepo::has_occupancy_history(&pool, room.id).await.unwrap());
    assert_eq!(RoomRepo::count_beds_in_use(&pool, room.id).await.unwrap(), 0);
    assert_eq!(RoomRepo::count_removable_beds(&pool, room.id).await.unwrap(), 1);

    let update = UpdateRoom {
        capacity: Some(1),
        ..unchanged_room()
    };
    RoomRepo::update(&pool, room.id, &update, &[], 1).await.unwrap().unwrap();

    let remaining = RoomRepo::beds(&pool, room.id).await.unwrap();
    let labels: Vec<_> = remaining.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, ["B"]);
    let history = OccupancyRepo::find_by_id(&pool, occupancy.id).await.unwrap().unwrap();
    assert_eq!(history.bed_id, beds[1].id);
}
