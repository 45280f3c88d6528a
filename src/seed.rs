use chrono::Utc;
use sea_orm::*;

use crate::models::{book, copy, policy, user};
use crate::services::inventory_service;

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Utc::now();

    // 1. Users
    let users = [
        ("desk", "lecturer", true),
        ("alice", "member", false),
        ("bob", "student", false),
        ("prof", "lecturer", false),
    ];
    for (username, role, is_staff) in users {
        let model = user::ActiveModel {
            username: Set(username.to_owned()),
            role: Set(role.to_owned()),
            is_staff: Set(is_staff),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        user::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await?;
    }

    // 2. Books with a couple of copies each
    let titles = [
        ("9780441013593", "Dune"),
        ("9780553293357", "Foundation"),
        ("9780261102385", "The Fellowship of the Ring"),
    ];
    for (i, (isbn, title)) in titles.iter().enumerate() {
        let existing = book::Entity::find()
            .filter(book::Column::Isbn13.eq(*isbn))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let saved = book::ActiveModel {
            isbn13: Set((*isbn).to_owned()),
            title: Set((*title).to_owned()),
            language: Set(Some("en".to_owned())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        for n in 1..=2 {
            let barcode = format!("BC-{:02}{:02}", i + 1, n);
            let existing = copy::Entity::find()
                .filter(copy::Column::Barcode.eq(&barcode))
                .one(db)
                .await?;
            if existing.is_none() {
                inventory_service::create_copy(db, saved.id, barcode, None, None, now)
                    .await
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
        }
    }

    // 3. Policy row mirroring the compiled defaults
    if policy::Entity::find().one(db).await?.is_none() {
        policy::ActiveModel {
            member_loan_days: Set(14),
            lecturer_loan_days: Set(28),
            member_loan_limit: Set(5),
            lecturer_loan_limit: Set(10),
            max_renewals: Set(2),
            fine_rate_minor_per_day: Set(500),
            hold_pickup_days: Set(3),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
