use std::sync::Barrier;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};

use rally_core::search::{PetitionQuery, SortKey};
use rally_core::{Denial, rules};
use rally_db::models::{NewPetition, NewSupporter};
use rally_db::{Database, DbError};
use rally_types::api::NewSupportTier;

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

fn tier(title: &str, cost: i64) -> NewSupportTier {
    NewSupportTier {
        title: title.into(),
        description: format!("{title} supporters"),
        cost,
    }
}

fn user(db: &Database, email: &str) -> i64 {
    db.create_user(email, "Test", "User", "$argon2id$not-a-real-hash")
        .unwrap()
}

fn petition(
    db: &Database,
    owner: i64,
    title: &str,
    category: i64,
    minute: u32,
    tiers: &[NewSupportTier],
) -> i64 {
    db.create_petition(
        &NewPetition {
            title,
            description: &format!("Description of {title}"),
            category_id: category,
            owner_id: owner,
            created_at: at(minute),
        },
        tiers,
    )
    .unwrap()
}

fn support(db: &Database, petition_id: i64, tier_id: i64, user_id: i64) -> Result<i64, DbError> {
    db.create_supporter(&NewSupporter {
        petition_id,
        support_tier_id: tier_id,
        user_id,
        message: Some("Good luck"),
        timestamp: at(30),
    })
}

fn first_tier(db: &Database, petition_id: i64) -> i64 {
    db.get_petition(petition_id).unwrap().unwrap().support_tiers[0].support_tier_id
}

/// Outcome of a checked write: refused by a rule or failed in the store.
#[derive(Debug)]
enum Refused {
    Rule(Denial),
    Store(DbError),
}

impl From<Denial> for Refused {
    fn from(denial: Denial) -> Self {
        Self::Rule(denial)
    }
}

impl From<DbError> for Refused {
    fn from(err: DbError) -> Self {
        Self::Store(err)
    }
}

fn forbidden<T: std::fmt::Debug>(result: &Result<T, Refused>) -> bool {
    matches!(result, Err(Refused::Rule(Denial::Forbidden(_))))
}

fn ids(db: &Database, query: &PetitionQuery) -> Vec<i64> {
    db.search_petitions(query)
        .unwrap()
        .items
        .iter()
        .map(|p| p.petition_id)
        .collect()
}

#[test]
fn owner_filter_returns_only_owned_petitions() {
    let db = Database::open_in_memory().unwrap();
    let alice = user(&db, "alice@example.com");
    let bob = user(&db, "bob@example.com");
    petition(&db, alice, "Alpha", 1, 0, &[tier("Bronze", 5)]);
    petition(&db, bob, "Beta", 1, 1, &[tier("Bronze", 5)]);
    petition(&db, alice, "Gamma", 2, 2, &[tier("Bronze", 5)]);

    let query = PetitionQuery {
        owner_id: Some(alice),
        count: Some(1),
        ..Default::default()
    };
    let page = db.search_petitions(&query).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert!(page.items.iter().all(|p| p.owner_id == alice));
}

#[test]
fn supporting_cost_filter_uses_cheapest_tier() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let id = petition(&db, owner, "Kakapo", 1, 0, &[tier("Bronze", 5), tier("Gold", 50)]);

    let within = PetitionQuery {
        max_supporting_cost: Some(10),
        ..Default::default()
    };
    assert_eq!(ids(&db, &within), vec![id]);

    let below = PetitionQuery {
        max_supporting_cost: Some(1),
        ..Default::default()
    };
    assert!(ids(&db, &below).is_empty());

    let page = db.search_petitions(&within).unwrap();
    assert_eq!(page.items[0].supporting_cost, Some(5));
}

#[test]
fn ties_break_on_ascending_id() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let a = petition(&db, owner, "Same time A", 1, 5, &[tier("T", 10)]);
    let b = petition(&db, owner, "Same time B", 1, 5, &[tier("T", 10)]);
    let c = petition(&db, owner, "Earlier", 1, 1, &[tier("T", 10)]);

    let created_desc = PetitionQuery {
        sort: SortKey::CreatedDesc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &created_desc), vec![a, b, c]);
    assert_eq!(ids(&db, &created_desc), ids(&db, &created_desc));

    let cost_desc = PetitionQuery {
        sort: SortKey::CostDesc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &cost_desc), vec![a, b, c]);
}

#[test]
fn cost_sorts_put_tierless_petitions_last() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let bare = petition(&db, owner, "No tiers", 1, 0, &[]);
    let cheap = petition(&db, owner, "Cheap", 1, 1, &[tier("T", 1)]);
    let dear = petition(&db, owner, "Dear", 1, 2, &[tier("T", 100)]);

    let asc = PetitionQuery {
        sort: SortKey::CostAsc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &asc), vec![cheap, dear, bare]);

    let desc = PetitionQuery {
        sort: SortKey::CostDesc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &desc), vec![dear, cheap, bare]);

    let page = db.search_petitions(&asc).unwrap();
    assert_eq!(page.items[2].supporting_cost, None);
}

#[test]
fn alphabetical_sort_orders_titles() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let b = petition(&db, owner, "Banana", 1, 0, &[tier("T", 1)]);
    let a = petition(&db, owner, "Apple", 1, 1, &[tier("T", 1)]);
    let c = petition(&db, owner, "Cherry", 1, 2, &[tier("T", 1)]);

    let asc = PetitionQuery {
        sort: SortKey::AlphabeticalAsc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &asc), vec![a, b, c]);

    let desc = PetitionQuery {
        sort: SortKey::AlphabeticalDesc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &desc), vec![c, b, a]);
}

#[test]
fn alphabetical_sort_ignores_case() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let zebra = petition(&db, owner, "Zebra crossings", 1, 0, &[tier("T", 1)]);
    let apple = petition(&db, owner, "apple orchards", 1, 1, &[tier("T", 1)]);
    let mango = petition(&db, owner, "Mango groves", 1, 2, &[tier("T", 1)]);

    let asc = PetitionQuery {
        sort: SortKey::AlphabeticalAsc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &asc), vec![apple, mango, zebra]);

    let desc = PetitionQuery {
        sort: SortKey::AlphabeticalDesc,
        ..Default::default()
    };
    assert_eq!(ids(&db, &desc), vec![zebra, mango, apple]);
}

#[test]
fn text_filter_is_case_sensitive_and_literal() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let upper = petition(&db, owner, "Save the Kakapo", 1, 0, &[tier("T", 1)]);
    let percent = petition(&db, owner, "100% renewable", 1, 1, &[tier("T", 1)]);
    petition(&db, owner, "Fund the library", 1, 2, &[tier("T", 1)]);

    let query = |text: &str| PetitionQuery {
        text: Some(text.into()),
        ..Default::default()
    };

    assert_eq!(ids(&db, &query("Kakapo")), vec![upper]);
    assert!(ids(&db, &query("kakapo")).is_empty());
    assert_eq!(ids(&db, &query("%")), vec![percent]);
    assert!(ids(&db, &query("_")).is_empty());
    // Matches in the description too.
    assert_eq!(ids(&db, &query("Description of Save")), vec![upper]);
}

#[test]
fn category_filter_matches_any_listed_category() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let one = petition(&db, owner, "One", 1, 0, &[tier("T", 1)]);
    petition(&db, owner, "Two", 2, 1, &[tier("T", 1)]);
    let three = petition(&db, owner, "Three", 3, 2, &[tier("T", 1)]);

    let query = PetitionQuery {
        category_ids: Some(vec![1, 3]),
        ..Default::default()
    };
    assert_eq!(ids(&db, &query), vec![one, three]);

    let impossible = PetitionQuery {
        category_ids: Some(vec![]),
        ..Default::default()
    };
    let page = db.search_petitions(&impossible).unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn supporter_filter_and_combined_filters() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let fan = user(&db, "fan@example.com");
    let liked = petition(&db, owner, "Liked", 1, 0, &[tier("T", 5)]);
    let also_liked = petition(&db, owner, "Also liked", 2, 1, &[tier("T", 50)]);
    petition(&db, owner, "Ignored", 1, 2, &[tier("T", 5)]);

    support(&db, liked, first_tier(&db, liked), fan).unwrap();
    support(&db, also_liked, first_tier(&db, also_liked), fan).unwrap();

    let supported = PetitionQuery {
        supporter_id: Some(fan),
        ..Default::default()
    };
    assert_eq!(ids(&db, &supported), vec![liked, also_liked]);

    let narrowed = PetitionQuery {
        supporter_id: Some(fan),
        max_supporting_cost: Some(10),
        ..Default::default()
    };
    assert_eq!(ids(&db, &narrowed), vec![liked]);
}

#[test]
fn pages_are_slices_of_the_full_result() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    for i in 0..6 {
        petition(&db, owner, &format!("Petition {i}"), 1, i % 3, &[tier("T", i as i64)]);
    }

    let full = ids(&db, &PetitionQuery::default());
    assert_eq!(full.len(), 6);

    for start in 0..8 {
        for count in 0..8 {
            let query = PetitionQuery {
                start_index: Some(start),
                count: Some(count),
                ..Default::default()
            };
            let page = db.search_petitions(&query).unwrap();
            let from = start.min(full.len());
            let to = (start + count).min(full.len());
            let got: Vec<i64> = page.items.iter().map(|p| p.petition_id).collect();
            assert_eq!(got, full[from..to].to_vec());
            assert_eq!(page.total, 6);
        }
    }
}

#[test]
fn uniqueness_violations_name_the_column() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let fan = user(&db, "fan@example.com");

    let dup_email = db.create_user("owner@example.com", "A", "B", "hash");
    assert!(matches!(dup_email, Err(DbError::UniqueViolation(c)) if c == "email"));

    let id = petition(&db, owner, "Unique", 1, 0, &[tier("Bronze", 5), tier("Gold", 50)]);
    let dup_title = db.create_petition(
        &NewPetition {
            title: "Unique",
            description: "again",
            category_id: 1,
            owner_id: owner,
            created_at: at(1),
        },
        &[tier("Bronze", 5)],
    );
    assert!(matches!(dup_title, Err(DbError::UniqueViolation(c)) if c == "title"));

    let dup_tier = db.add_support_tier(id, &tier("Gold", 70));
    assert!(matches!(dup_tier, Err(DbError::UniqueViolation(c)) if c == "title"));

    let tiers = db.get_petition(id).unwrap().unwrap().support_tiers;
    support(&db, id, tiers[0].support_tier_id, fan).unwrap();
    let again = support(&db, id, tiers[0].support_tier_id, fan);
    assert!(matches!(again, Err(DbError::UniqueViolation(c)) if c == "support_tier_id"));

    // A different tier of the same petition is fine.
    support(&db, id, tiers[1].support_tier_id, fan).unwrap();
}

#[test]
fn failed_petition_insert_leaves_nothing_behind() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");

    let result = db.create_petition(
        &NewPetition {
            title: "Twins",
            description: "two tiers with one title",
            category_id: 1,
            owner_id: owner,
            created_at: at(0),
        },
        &[tier("Same", 1), tier("Same", 2)],
    );
    assert!(matches!(result, Err(DbError::UniqueViolation(_))));
    assert_eq!(db.search_petitions(&PetitionQuery::default()).unwrap().total, 0);
}

#[test]
fn unknown_category_is_a_foreign_key_violation() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let result = db.create_petition(
        &NewPetition {
            title: "Nowhere",
            description: "no such category",
            category_id: 999,
            owner_id: owner,
            created_at: at(0),
        },
        &[tier("T", 1)],
    );
    assert!(matches!(result, Err(DbError::ForeignKeyViolation(c)) if c == "category_id"));
}

#[test]
fn facts_and_detail_track_supporters() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let fan = user(&db, "fan@example.com");
    let other = user(&db, "other@example.com");
    let id = petition(&db, owner, "Counted", 4, 0, &[tier("Bronze", 5), tier("Gold", 50)]);
    let tiers = db.get_petition(id).unwrap().unwrap().support_tiers;

    support(&db, id, tiers[0].support_tier_id, fan).unwrap();
    support(&db, id, tiers[1].support_tier_id, other).unwrap();

    let facts = db.petition_facts(id).unwrap().unwrap();
    assert_eq!(facts.owner_id, owner);
    assert_eq!(facts.tier_count, 2);
    assert_eq!(facts.supporter_count, 2);

    let tier_facts = db.tier_facts(tiers[1].support_tier_id).unwrap().unwrap();
    assert_eq!(tier_facts.petition_id, id);
    assert_eq!(tier_facts.supporter_count, 1);

    let detail = db.get_petition(id).unwrap().unwrap();
    assert_eq!(detail.number_of_supporters, 2);
    assert_eq!(detail.money_raised, 55);
    assert_eq!(detail.creation_date, at(0));

    assert_eq!(db.get_supporters(id).unwrap().len(), 2);
    assert!(db.petition_facts(id + 1).unwrap().is_none());
}

#[test]
fn deleting_a_petition_removes_its_tiers() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let id = petition(&db, owner, "Short lived", 1, 0, &[tier("T", 1)]);
    let tier_id = first_tier(&db, id);

    db.delete_petition(id).unwrap();

    assert!(db.get_petition(id).unwrap().is_none());
    assert!(db.tier_facts(tier_id).unwrap().is_none());
}

#[test]
fn tokens_are_set_looked_up_and_cleared() {
    let db = Database::open_in_memory().unwrap();
    let id = user(&db, "owner@example.com");

    db.set_auth_token(id, "abc123").unwrap();
    assert_eq!(db.get_user_by_token("abc123").unwrap().unwrap().id, id);

    assert!(db.clear_auth_token("abc123").unwrap());
    assert!(!db.clear_auth_token("abc123").unwrap());
    assert!(db.get_user_by_token("abc123").unwrap().is_none());
}

#[test]
fn categories_are_seeded() {
    let db = Database::open_in_memory().unwrap();
    let categories = db.get_categories().unwrap();
    assert_eq!(categories.len(), rally_db::migrations::CATEGORIES.len());
    assert_eq!(categories[0].name, "Wildlife");
}

#[test]
fn concurrent_tier_adds_respect_the_limit() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let id = petition(&db, owner, "Crowded", 1, 0, &[tier("Bronze", 5), tier("Silver", 10)]);
    let barrier = Barrier::new(4);

    let results: Vec<Result<i64, Refused>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let (db, barrier) = (&db, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    db.with_tx(|tx| -> Result<i64, Refused> {
                        let facts = tx.petition_facts(id)?;
                        rules::add_support_tier(owner, facts.as_ref())?;
                        Ok(tx.add_support_tier(id, &tier(&format!("Gold {n}"), 20))?)
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|&r| forbidden(r)).count(), 3);
    assert_eq!(db.petition_facts(id).unwrap().unwrap().tier_count, 3);
}

#[test]
fn concurrent_tier_deletes_leave_one_tier() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let id = petition(&db, owner, "Shrinking", 1, 0, &[tier("Bronze", 5), tier("Silver", 10)]);
    let tiers: Vec<i64> = db
        .get_petition(id)
        .unwrap()
        .unwrap()
        .support_tiers
        .iter()
        .map(|t| t.support_tier_id)
        .collect();
    let barrier = Barrier::new(tiers.len());

    let results: Vec<Result<(), Refused>> = thread::scope(|scope| {
        let handles: Vec<_> = tiers
            .iter()
            .map(|&tier_id| {
                let (db, barrier) = (&db, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    db.with_tx(|tx| -> Result<(), Refused> {
                        let petition = tx.petition_facts(id)?;
                        let tier = tx.tier_facts(tier_id)?;
                        rules::delete_support_tier(owner, petition.as_ref(), tier.as_ref())?;
                        Ok(tx.delete_support_tier(tier_id)?)
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|&r| forbidden(r)).count(), 1);
    assert_eq!(db.petition_facts(id).unwrap().unwrap().tier_count, 1);
}

#[test]
fn pledge_and_delete_do_not_interleave() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let fan = user(&db, "fan@example.com");
    let id = petition(&db, owner, "Contested", 1, 0, &[tier("Bronze", 5)]);
    let tier_id = first_tier(&db, id);
    let barrier = Barrier::new(2);

    let (pledged, deleted) = thread::scope(|scope| {
        let pledge = scope.spawn(|| {
            barrier.wait();
            db.with_tx(|tx| -> Result<i64, Refused> {
                let petition = tx.petition_facts(id)?;
                let tier = tx.tier_facts(tier_id)?;
                rules::create_supporter(fan, petition.as_ref(), tier.as_ref())?;
                Ok(tx.create_supporter(&NewSupporter {
                    petition_id: id,
                    support_tier_id: tier_id,
                    user_id: fan,
                    message: None,
                    timestamp: at(5),
                })?)
            })
        });
        let delete = scope.spawn(|| {
            barrier.wait();
            db.with_tx(|tx| -> Result<(), Refused> {
                let facts = tx.petition_facts(id)?;
                rules::delete_petition(owner, facts.as_ref())?;
                Ok(tx.delete_petition(id)?)
            })
        });
        (pledge.join().unwrap(), delete.join().unwrap())
    });

    match db.petition_facts(id).unwrap() {
        Some(facts) => {
            assert!(pledged.is_ok());
            assert!(forbidden(&deleted));
            assert_eq!(facts.supporter_count, 1);
        }
        None => {
            assert!(deleted.is_ok());
            assert!(matches!(pledged, Err(Refused::Rule(Denial::NotFound(_)))));
        }
    }
}

#[test]
fn failed_check_rolls_back_the_transaction() {
    let db = Database::open_in_memory().unwrap();
    let owner = user(&db, "owner@example.com");
    let id = petition(&db, owner, "Untouched", 1, 0, &[tier("Bronze", 5)]);

    let result = db.with_tx(|tx| -> Result<(), Refused> {
        tx.add_support_tier(id, &tier("Silver", 10))?;
        Err(Denial::forbidden("changed my mind").into())
    });

    assert!(forbidden(&result));
    assert_eq!(db.petition_facts(id).unwrap().unwrap().tier_count, 1);
}
