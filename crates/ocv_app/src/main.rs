mod dispatch;

use tracing_subscriber::EnvFilter;

use dispatch::{Dispatcher, AUTOSAVE_DELAY_STEPS};
use ocv_core::fen::Turn;
use ocv_core::message::Message;
use ocv_core::model::BBox;
use ocv_rt::board::NoopBoard;
use ocv_rt::clipboard::MemoryClipboard;
use ocv_rt::engine::ScriptedEngine;
use ocv_rt::persistence::FileStudyStore;
use ocv_rt::recognition::{RecognizedPosition, ScriptedRecognizer};

// Demo walkthrough against simulated ports: open a book, recognize a
// diagram, play moves to reach it, and study the resulting line.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut recognizer = ScriptedRecognizer::default();
    recognizer.push_detection(vec![BBox {
        x: 72.0,
        y: 140.0,
        width: 220.0,
        height: 220.0,
    }]);
    recognizer.push_recognition(Ok(RecognizedPosition {
        placement: "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR".to_string(),
        confidence: 0.96,
    }));

    let store = FileStudyStore::new(
        std::env::var_os("OCV_DATA_DIR").unwrap_or_else(|| "studies".into()),
    );

    let mut app = Dispatcher::new(
        Box::new(recognizer),
        Box::new(store),
        Box::new(ScriptedEngine::default()),
        Box::new(NoopBoard),
        Box::new(MemoryClipboard::default()),
    );

    app.dispatch(Message::PdfOpened {
        pdf_id: "demo-hash".to_string(),
        content_hash: "demo-hash".to_string(),
        filename: "open-games.pdf".to_string(),
        total_pages: 240,
    });
    println!("opened: workflow {}", app.model().workflow.tag());

    app.dispatch(Message::DiagramClicked { index: 0 });
    app.dispatch(Message::PiecesConfirmed {
        placement: "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR".to_string(),
        turn: Turn::White,
    });
    app.dispatch(Message::StartNewGame);
    println!("reaching: workflow {}", app.model().workflow.tag());

    for (san, fen) in [
        (
            "e4",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        ),
        (
            "e5",
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        ),
    ] {
        app.dispatch(Message::ReachMoveMade {
            san: san.to_string(),
            fen: fen.to_string(),
        });
    }
    app.dispatch(Message::ReachDone);
    println!("analysis: workflow {}", app.model().workflow.tag());

    app.dispatch(Message::AnalysisMoveMade {
        san: "Nf3".to_string(),
        fen: "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2".to_string(),
    });

    if let Some(pgn) = app.active_pgn() {
        println!("{pgn}");
    }

    app.run_steps(AUTOSAVE_DELAY_STEPS + 1);
    println!("saved: dirty = {}", app.model().is_dirty);
}
