use std::collections::BTreeMap;

use squad_core::store::{ImportedEvent, ImportedFixture, ImportedPlayer};
use squad_core::{
    Player, PlayerImport, PlayerStore, Position, SqlitePlayerStore, StoreError, Team,
};

fn setup_store() -> (tempfile::TempDir, SqlitePlayerStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePlayerStore::builder()
        .path(dir.path().join("players.sqlite"))
        .create_if_missing(true)
        .build()
        .unwrap();
    store.initialize().unwrap();
    (dir, store)
}

fn team(name: &str) -> Team {
    Team {
        name: name.to_string(),
        overall: 70.0,
        attack: 68.0,
        defend: 72.0,
    }
}

fn fixture(points: i64, events: &[(&str, i64, i64)]) -> ImportedFixture {
    ImportedFixture {
        points,
        events: events
            .iter()
            .map(|(name, quantity, points)| {
                (
                    name.to_string(),
                    ImportedEvent {
                        quantity: *quantity,
                        points: *points,
                    },
                )
            })
            .collect(),
    }
}

fn sample_import() -> PlayerImport {
    let entries = vec![
        (
            Player::new("Cohen", Position::Goalkeeper, "Hapoel", 8, 30),
            vec![
                ("fixture1", fixture(6, &[("Clean Sheets", 1, 4)])),
                ("fixture2", fixture(2, &[("Goals Conceded", 2, -1)])),
            ],
        ),
        (
            Player::new("Levi", Position::Defender, "Hapoel", 6, 18),
            vec![("fixture1", fixture(4, &[("Clean Sheets", 1, 4)]))],
        ),
        (
            Player::new("Zahavi", Position::Forward, "Maccabi", 12, 55),
            vec![
                ("fixture1", fixture(9, &[("Goals Scored", 2, 8)])),
                ("fixture2", fixture(12, &[("Goals Scored", 3, 12), ("Assists", 1, 3)])),
            ],
        ),
        (Player::new("Peretz", Position::Midfielder, "Maccabi", 7, 0), vec![]),
    ];
    PlayerImport {
        teams: vec![team("Hapoel"), team("Maccabi")],
        players: entries
            .into_iter()
            .map(|(player, fixtures)| ImportedPlayer {
                player,
                fixtures: fixtures
                    .into_iter()
                    .map(|(name, fixture)| (name.to_string(), fixture))
                    .collect(),
            })
            .collect(),
    }
}

#[test]
fn import_populates_every_table() {
    let (_dir, store) = setup_store();
    let summary = store.import(&sample_import()).unwrap();
    assert_eq!(summary.teams, 2);
    assert_eq!(summary.players, 4);
    assert_eq!(summary.fixtures, 5);
    assert_eq!(summary.events, 6);

    let counts = store.counts().unwrap();
    assert_eq!(counts.players, 4);
    assert_eq!(counts.fixtures, 5);
    assert_eq!(counts.events, 6);
    assert_eq!(store.integrity_check().unwrap(), "ok");
}

#[test]
fn repeated_import_inserts_nothing() {
    let (_dir, store) = setup_store();
    store.import(&sample_import()).unwrap();
    let again = store.import(&sample_import()).unwrap();
    assert_eq!(again.teams + again.players + again.fixtures + again.events, 0);
    assert_eq!(store.counts().unwrap().fixtures, 5);
}

#[test]
fn fixture_snapshot_carries_period_points() {
    let (_dir, store) = setup_store();
    store.import(&sample_import()).unwrap();

    assert_eq!(store.list_fixtures().unwrap(), vec!["fixture1", "fixture2"]);
    let snapshot = store.get_players_by_fixture("fixture2").unwrap();
    let points: BTreeMap<&str, i64> = snapshot
        .iter()
        .map(|player| (player.name.as_str(), player.points))
        .collect();
    assert_eq!(points.len(), 2);
    assert_eq!(points["Cohen"], 2);
    assert_eq!(points["Zahavi"], 12);
    assert!(store.get_players_by_fixture("fixture9").unwrap().is_empty());
}

#[test]
fn point_and_club_queries() {
    let (_dir, store) = setup_store();
    store.import(&sample_import()).unwrap();

    let names: Vec<String> = store
        .get_players_min_points(18)
        .unwrap()
        .into_iter()
        .map(|player| player.name)
        .collect();
    assert_eq!(names, vec!["Cohen", "Zahavi"]);

    store.update_player("Levi", "Hapoel", 18, true).unwrap();
    assert!(store
        .get_players_by_position_and_club(Position::Defender, "Hapoel")
        .unwrap()
        .is_empty());
    let forwards = store
        .get_players_by_position_and_club(Position::Forward, "Maccabi")
        .unwrap();
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0].price, 12);

    let err = store.update_player("Nobody", "Hapoel", 1, false).unwrap_err();
    assert!(matches!(err, StoreError::PlayerNotFound { .. }));
}

#[test]
fn stars_and_totals_round_trip() {
    let (_dir, store) = setup_store();
    store.import(&sample_import()).unwrap();

    let updated = store
        .update_stars(&[("Zahavi".to_string(), 5), ("Ghost".to_string(), 3)])
        .unwrap();
    assert_eq!(updated, 1);
    let zahavi = store.get_player("Zahavi").unwrap().unwrap();
    assert_eq!(zahavi.stars, Some(5));
    assert_eq!(store.get_player("Ghost").unwrap(), None);

    let totals = store.totals_with_events().unwrap();
    let zahavi = totals.iter().find(|t| t.name == "Zahavi").unwrap();
    assert_eq!(zahavi.games_played, 2);
    assert_eq!(zahavi.events["Goals Scored"], 5);
    assert_eq!(zahavi.events["Assists"], 1);
    let peretz = totals.iter().find(|t| t.name == "Peretz").unwrap();
    assert_eq!(peretz.games_played, 0);
    assert!(peretz.events.is_empty());
}

#[test]
fn single_row_inserts_are_idempotent() {
    let (_dir, store) = setup_store();
    assert!(store.insert_team(&team("Beitar")).unwrap());
    assert!(!store.insert_team(&team("Beitar")).unwrap());

    let player = Player::new("Atar", Position::Forward, "Beitar", 9, 20);
    assert!(store.insert_player(&player).unwrap());
    assert!(!store.insert_player(&player).unwrap());

    let first = store.insert_fixture("Atar", "fixture1", 7, "Beitar").unwrap();
    let second = store.insert_fixture("Atar", "fixture1", 99, "Beitar").unwrap();
    assert_eq!(first, second);
    assert!(store.insert_event(first, "Goals Scored", 1, 4).unwrap());
    assert!(!store.insert_event(first, "Goals Scored", 1, 4).unwrap());

    let snapshot = store.get_players_by_fixture("fixture1").unwrap();
    assert_eq!(snapshot[0].points, 7);
    assert_eq!(store.list_teams().unwrap()[0].name, "Beitar");
}

#[test]
fn fixture_name_lookup_falls_back_to_season_table() {
    let (_dir, store) = setup_store();
    store.import(&sample_import()).unwrap();

    let players = store
        .get_players_by_fixture_names(
            "fixture2",
            &["Zahavi".to_string(), "Peretz".to_string()],
        )
        .unwrap();
    assert_eq!(players[0].points, 12);
    assert_eq!(players[1].name, "Peretz");
    assert_eq!(players[1].points, 0);

    let err = store
        .get_players_by_fixture_names("fixture2", &["Ghost".to_string()])
        .unwrap_err();
    assert!(matches!(err, StoreError::PlayerNotFound { .. }));
}

#[test]
fn read_only_store_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePlayerStore::builder()
        .path(dir.path().join("absent.sqlite"))
        .read_only(true)
        .build()
        .unwrap();
    assert!(matches!(
        store.get_all_players(),
        Err(StoreError::OpenDatabase { .. })
    ));
    assert!(matches!(
        SqlitePlayerStore::builder().build(),
        Err(StoreError::MissingStore)
    ));
}
