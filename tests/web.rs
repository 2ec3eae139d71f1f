#![cfg(target_arch = "wasm32")]

use quoridor_core::{
    check_winner, compute_valid_moves, new_game, validate_state, GameState, Position,
    QuoridorEngine,
};
use serde_wasm_bindgen::from_value;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn fresh_game_offers_three_moves() {
    let state = new_game(None, None).expect("new game");
    validate_state(state.clone()).expect("fresh state is valid");
    let moves: Vec<Position> =
        from_value(compute_valid_moves(state.clone()).expect("moves")).expect("positions");
    assert_eq!(moves.len(), 3);
    assert_eq!(check_winner(state).expect("winner query"), None);
}

#[wasm_bindgen_test]
fn engine_round_trips_state_json() {
    let mut engine = QuoridorEngine::new(Some(r#"{"type":"PlayerVsPlayer"}"#.into()))
        .expect("engine");
    engine.click_cell(7, 4).expect("player one moves");
    let json = engine.state_json().expect("state json");
    let state: GameState = serde_json::from_str(&json).expect("state parses");
    assert_eq!(state.turn, 2);
    assert!(!engine.is_ai_turn());
}
