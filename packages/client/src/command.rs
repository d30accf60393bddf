//! Terminal commands
//!
//! 入力 1 行を `Command` に解釈し、エンジンへのポインター操作に変換する。
//! 座標はすべてスクリーン座標で、エンジンがビューポートでルーム座標に変換する。

use std::str::FromStr;

use tegaki_shared::{
    canvas::{FillColor, Point, ShapeKind},
    sanitize::{DEFAULT_MAX_CHAT_LEN, sanitize_chat_text},
};

use crate::{
    domain::{PointerButton, SyncEngine, Tool},
    formatter::MessageFormatter,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(String),
    Draw { from: Point, to: Point },
    Select(Point),
    Delete,
    Pan { dx: f64, dy: f64 },
    Zoom { zoom_in: bool, at: Point },
    Move(Point),
    Tool(Tool),
    Shape(ShapeKind),
    Color(FillColor),
    Clear,
    List,
    Who,
    Ping,
    Help,
    Quit,
}

impl Command {
    /// 入力行を解釈する（`/` で始まらない行はチャット）
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Chat(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match name {
            "draw" => {
                let [x1, y1, x2, y2] = numbers::<4>(&args)?;
                Ok(Command::Draw {
                    from: Point::new(x1, y1),
                    to: Point::new(x2, y2),
                })
            }
            "select" => {
                let [x, y] = numbers::<2>(&args)?;
                Ok(Command::Select(Point::new(x, y)))
            }
            "delete" => Ok(Command::Delete),
            "pan" => {
                let [dx, dy] = numbers::<2>(&args)?;
                Ok(Command::Pan { dx, dy })
            }
            "zoom" => {
                let zoom_in = match args.first().copied() {
                    Some("in") => true,
                    Some("out") => false,
                    _ => return Err("usage: /zoom in|out [x y]".to_string()),
                };
                let at = if args.len() > 1 {
                    let [x, y] = numbers::<2>(&args[1..])?;
                    Point::new(x, y)
                } else {
                    Point::default()
                };
                Ok(Command::Zoom { zoom_in, at })
            }
            "move" => {
                let [x, y] = numbers::<2>(&args)?;
                Ok(Command::Move(Point::new(x, y)))
            }
            "tool" => single(&args).and_then(Tool::from_str).map(Command::Tool),
            "shape" => single(&args).and_then(|s| {
                ShapeKind::from_str(s)
                    .map(Command::Shape)
                    .map_err(|_| format!("unknown shape '{}'", s))
            }),
            "color" => single(&args).and_then(|s| {
                FillColor::from_str(s)
                    .map(Command::Color)
                    .map_err(|_| format!("unknown color '{}'", s))
            }),
            "clear" => Ok(Command::Clear),
            "list" => Ok(Command::List),
            "who" => Ok(Command::Who),
            "ping" => Ok(Command::Ping),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '/{}', try /help", other)),
        }
    }
}

fn single<'a>(args: &[&'a str]) -> Result<&'a str, String> {
    match args {
        [value] => Ok(value),
        _ => Err("expected exactly one argument".to_string()),
    }
}

fn numbers<const N: usize>(args: &[&str]) -> Result<[f64; N], String> {
    if args.len() != N {
        return Err(format!("expected {} numbers", N));
    }
    let mut values = [0.0; N];
    for (slot, arg) in values.iter_mut().zip(args) {
        let value: f64 = arg
            .parse()
            .map_err(|_| format!("'{}' is not a number", arg))?;
        if !value.is_finite() {
            return Err(format!("'{}' is not a finite number", arg));
        }
        *slot = value;
    }
    Ok(values)
}

/// コマンドをエンジンに適用し、表示するテキストを返す
///
/// `Quit` はセッション側で扱うためここでは何もしない。
pub fn execute(engine: &mut SyncEngine, command: Command, now: i64) -> Option<String> {
    match command {
        // The relay applies the same sanitizing and does not echo chat back to its sender.
        Command::Chat(text) => {
            let text = sanitize_chat_text(&text, DEFAULT_MAX_CHAT_LEN);
            engine.send_chat(&text).then(|| {
                MessageFormatter::format_chat_message(engine.display_name(), &text, now)
            })
        }
        Command::Draw { from, to } => {
            let previous = engine.tool();
            engine.set_tool(Tool::Draw);
            engine.pointer_down(from, PointerButton::Primary);
            engine.pointer_move(to, now);
            let committed = engine.pointer_up(to, now);
            engine.set_tool(previous);
            Some(match committed {
                Some(shape) => format!("\ndrew {}\n", shape.id),
                None => "\ntoo small, discarded\n".to_string(),
            })
        }
        Command::Select(at) => {
            let previous = engine.tool();
            engine.set_tool(Tool::Select);
            engine.pointer_down(at, PointerButton::Primary);
            engine.pointer_up(at, now);
            engine.set_tool(previous);
            Some(match engine.selected() {
                Some(id) => format!("\nselected {}\n", id),
                None => "\nnothing there\n".to_string(),
            })
        }
        Command::Delete => Some(match engine.delete_selected() {
            Some(id) => format!("\ndeleted {}\n", id),
            None => "\nnothing selected\n".to_string(),
        }),
        Command::Pan { dx, dy } => {
            let origin = Point::default();
            let target = Point::new(dx, dy);
            engine.pointer_down(origin, PointerButton::Middle);
            engine.pointer_move(target, now);
            engine.pointer_up(target, now);
            None
        }
        Command::Zoom { zoom_in, at } => {
            engine.wheel(at, if zoom_in { -1.0 } else { 1.0 });
            None
        }
        Command::Move(at) => {
            engine.pointer_move(at, now);
            None
        }
        Command::Tool(tool) => {
            engine.set_tool(tool);
            Some(format!("\ntool: {}\n", tool))
        }
        Command::Shape(kind) => {
            engine.set_shape_kind(kind);
            None
        }
        Command::Color(color) => {
            engine.set_color(color);
            None
        }
        Command::Clear => {
            engine.clear();
            Some("\ncanvas cleared\n".to_string())
        }
        Command::List => Some(MessageFormatter::format_shapes(engine.shapes())),
        Command::Who => Some(MessageFormatter::format_members(
            engine.members(),
            engine.identity(),
        )),
        Command::Ping => {
            engine.ping(now);
            None
        }
        Command::Help => Some(MessageFormatter::format_help()),
        Command::Quit => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineConfig;
    use tegaki_shared::protocol::ProtocolMessage;

    fn engine() -> SyncEngine {
        SyncEngine::new(EngineConfig::new("alice", "Alice", "demo"))
    }

    #[test]
    fn test_parse_commands() {
        // テスト項目: 各コマンドが正しく解釈される
        // given (前提条件):
        let inputs = [
            "/draw 10 10 50 40",
            "/zoom out 5 6",
            "/shape circle",
            "/color none",
            "  hello there ",
        ];

        // when (操作):
        let parsed: Vec<Command> = inputs.iter().map(|l| Command::parse(l).unwrap()).collect();

        // then (期待する結果):
        assert_eq!(
            parsed,
            vec![
                Command::Draw {
                    from: Point::new(10.0, 10.0),
                    to: Point::new(50.0, 40.0),
                },
                Command::Zoom {
                    zoom_in: false,
                    at: Point::new(5.0, 6.0),
                },
                Command::Shape(ShapeKind::Ellipse),
                Command::Color(FillColor::Transparent),
                Command::Chat("hello there".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        // テスト項目: 引数の数や数値が不正なコマンドはエラーになる
        // given (前提条件):
        let inputs = ["/draw 1 2 3", "/select x 1", "/pan 1 NaN", "/tool eraser", "/nope"];

        // when (操作):
        let results: Vec<bool> = inputs.iter().map(|l| Command::parse(l).is_err()).collect();

        // then (期待する結果):
        assert!(results.iter().all(|&is_err| is_err));
    }

    #[test]
    fn test_draw_command_emits_shape_and_restores_tool() {
        // テスト項目: /draw で図形が確定し、元のツールに戻る
        // given (前提条件):
        let mut engine = engine();
        engine.set_color(FillColor::Red);

        // when (操作):
        let output = execute(
            &mut engine,
            Command::parse("/draw 10 10 50 40").unwrap(),
            1_000,
        );

        // then (期待する結果):
        assert!(output.unwrap().contains("drew alice-1000-1"));
        assert_eq!(engine.tool(), Tool::Select);
        let outbound = engine.take_outbound();
        let added = outbound
            .iter()
            .find(|m| m.kind() == "shape_added")
            .unwrap();
        let ProtocolMessage::ShapeAdded { data, .. } = added else {
            unreachable!()
        };
        assert_eq!(data.color, FillColor::Red);
        assert_eq!(data.end_point, Point::new(50.0, 40.0));
    }

    #[test]
    fn test_pan_command_moves_viewport() {
        // テスト項目: /pan でビューポートが移動し、図形メッセージは送られない
        // given (前提条件):
        let mut engine = engine();
        engine.set_tool(Tool::Draw);

        // when (操作):
        execute(&mut engine, Command::Pan { dx: 20.0, dy: -5.0 }, 0);

        // then (期待する結果):
        assert_eq!(engine.viewport().x, 20.0);
        assert_eq!(engine.viewport().y, -5.0);
        assert!(engine.shapes().is_empty());
    }

    #[test]
    fn test_chat_echo_matches_sanitized_text() {
        // テスト項目: ローカルのチャット表示と送信内容は relay と同じくサニタイズされる
        // given (前提条件):
        let mut engine = engine();

        // when (操作):
        let echo = execute(&mut engine, Command::Chat("hi\u{7}     there".to_string()), 0);
        let control_only = execute(&mut engine, Command::Chat("\u{7}\u{1b}".to_string()), 0);

        // then (期待する結果):
        assert_eq!(echo.as_deref(), Some("\n[00:00:00] @Alice: hi  there\n"));
        assert_eq!(control_only, None);
        match engine.take_outbound().as_slice() {
            [ProtocolMessage::Chat { text, .. }] => assert_eq!(text, "hi  there"),
            other => panic!("unexpected messages: {:?}", other),
        }
    }
}
