//! The projection law: for any state and viewer, snapshots hide opponents'
//! hidden data while preserving counts, and the union of all viewers' visible
//! cards reconstructs exactly the authoritative multiset.

use cardroom::lobby::config::LobbySettings;
use cardroom::lobby::{ActiveGame, Lobby, Phase, PlayerProfile};
use cardroom::poker::PokerTable;
use cardroom::rng::seeded_rng;
use cardroom::types::{GameKind, UserId};
use cardroom::uno::{Face, UnoGame};
use cardroom::view::{snapshot_for, GameSnapshot};
use std::collections::HashMap;

fn profile(name: &str) -> PlayerProfile {
    PlayerProfile {
        nickname: name.to_string(),
        ..PlayerProfile::default()
    }
}

fn uno_lobby(players: usize, seed: u64) -> Lobby {
    let mut lobby = Lobby::new(
        GameKind::Uno,
        "PRJUNO".to_string(),
        1,
        false,
        LobbySettings::default(),
    );
    let order: Vec<UserId> = (1..=players as UserId).collect();
    for &user in &order {
        lobby.add_seat(user, profile(&format!("p{user}"))).unwrap();
    }
    lobby.game = ActiveGame::Uno(UnoGame::new(order, 0, &mut *seeded_rng(seed)).unwrap());
    lobby.phase = Phase::Playing;
    lobby
}

#[test]
fn test_uno_projection_preserves_counts_and_hides_faces() {
    let lobby = uno_lobby(4, 21);
    let ActiveGame::Uno(game) = &lobby.game else {
        unreachable!();
    };

    for viewer in 1..=4 {
        let snapshot = snapshot_for(&lobby, viewer);
        let Some(GameSnapshot::Uno(uno)) = snapshot.state else {
            panic!("expected uno state");
        };
        assert_eq!(uno.draw_pile_count, game.draw_pile.len());
        for hand in &uno.hands {
            assert_eq!(hand.cards.len(), game.hand_len(hand.user_id));
            let should_see = hand.user_id == viewer;
            for card in &hand.cards {
                assert_eq!(card.face.is_some(), should_see);
            }
        }
    }
}

#[test]
fn test_uno_union_of_views_reconstructs_hands_without_leaks() {
    let lobby = uno_lobby(3, 22);
    let ActiveGame::Uno(game) = &lobby.game else {
        unreachable!();
    };

    // Gather every face each viewer can see of each player's hand.
    let mut seen: HashMap<UserId, Vec<Face>> = HashMap::new();
    for viewer in 1..=3 {
        let snapshot = snapshot_for(&lobby, viewer);
        let Some(GameSnapshot::Uno(uno)) = snapshot.state else {
            panic!("expected uno state");
        };
        for hand in &uno.hands {
            for card in hand.cards.iter().filter_map(|c| c.face) {
                seen.entry(hand.user_id).or_default().push(card);
            }
        }
    }

    // Each hand is seen exactly once (by its owner): no loss, no leak.
    for (&user, faces) in &seen {
        let mut expected: Vec<Face> = game.hands[&user].iter().map(|c| c.face).collect();
        let mut got = faces.clone();
        expected.sort_by_key(|f| format!("{f:?}"));
        got.sort_by_key(|f| format!("{f:?}"));
        assert_eq!(got, expected);
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_poker_union_of_views_shows_each_hole_exactly_once() {
    let mut lobby = Lobby::new(
        GameKind::Poker,
        "PRJPKR".to_string(),
        1,
        false,
        LobbySettings::default(),
    );
    let mut table = PokerTable::new(10, 20, 1000, 8);
    for user in 1..=4 {
        lobby.add_seat(user, profile(&format!("p{user}"))).unwrap();
        table.add_player(user).unwrap();
    }
    table.start_hand(&mut *seeded_rng(23)).unwrap();
    lobby.phase = Phase::Playing;
    lobby.game = ActiveGame::Poker(table);

    let ActiveGame::Poker(table) = &lobby.game else {
        unreachable!();
    };
    let mut visible = 0;
    for viewer in 1..=4 {
        let snapshot = snapshot_for(&lobby, viewer);
        let Some(GameSnapshot::Poker(poker)) = snapshot.state else {
            panic!("expected poker state");
        };
        for seat in &poker.seats {
            if let Some(hole) = seat.hole {
                assert_eq!(seat.user_id, viewer, "mid-hand hole leaked to opponent");
                let authoritative = table
                    .seats
                    .iter()
                    .find(|s| s.user_id == seat.user_id)
                    .and_then(|s| s.hole)
                    .unwrap();
                assert_eq!(hole, authoritative);
                visible += 1;
            }
        }
    }
    // Each of the four players sees exactly their own two cards.
    assert_eq!(visible, 4);
}
