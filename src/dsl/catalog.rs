//! Builtin vocabulary of the robot IDE: events, readable properties, writable
//! properties, statement blocks and reporter blocks. Data only; lookup lives in
//! [`super::builtins::Catalog`].

use super::ast::DataType::{Boolean, Image, Number, NumberList, String, StringList};
use super::builtins::{field, input, list, menu, sig, AssignTarget, Builtin};

pub const BUTTONS: &[&str] = &["a", "b", "left", "right", "center"];
pub const COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "cyan", "blue", "purple", "white", "black",
];
pub const GESTURES: &[&str] = &[
    "shake", "tilt left", "tilt right", "tilt forward", "tilt back", "free fall",
];
pub const PORTS: &[&str] = &["A", "B", "C", "D"];

/// `@name [param]:` hats.
pub static EVENTS: &[Builtin] = &[
    Builtin {
        name: "start", description: "When the program starts",
        signatures: &[sig!([], None, "event_whenprogramstarts")],
    },
    Builtin {
        name: "button", description: "When a hub button is pressed",
        signatures: &[sig!([field("button", "BUTTON", BUTTONS)], None, "robot_whenbuttonpressed")],
    },
    Builtin {
        name: "gesture", description: "When the hub detects a motion gesture",
        signatures: &[sig!([field("gesture", "GESTURE", GESTURES)], None, "robot_whengesture")],
    },
    Builtin {
        name: "color", description: "When the color sensor sees a color",
        signatures: &[sig!([field("color", "COLOR", COLORS)], None, "robot_whencolordetected")],
    },
    Builtin {
        name: "obstacle", description: "When something comes close to the distance sensor",
        signatures: &[sig!([], None, "robot_whenobstacle")],
    },
    Builtin {
        name: "timer", description: "When the timer passes a number of seconds",
        signatures: &[sig!([input("seconds", Number, "VALUE")], None, "event_whengreaterthan", [("WHENGREATERTHANMENU", "TIMER")])],
    },
    Builtin {
        name: "loudness", description: "When the microphone hears a sound louder than a level",
        signatures: &[sig!([input("level", Number, "VALUE")], None, "event_whengreaterthan", [("WHENGREATERTHANMENU", "LOUDNESS")])],
    },
];

/// Readable builtin properties.
pub static VARIABLES: &[Builtin] = &[
    Builtin {
        name: "timer", description: "Seconds since start or last reset",
        signatures: &[sig!([], Some(Number), "sensing_timer")],
    },
    Builtin {
        name: "sensor.distance", description: "Distance sensor reading in cm",
        signatures: &[sig!([], Some(Number), "robot_distance")],
    },
    Builtin {
        name: "sensor.loudness", description: "Microphone level 0-100",
        signatures: &[sig!([], Some(Number), "sensing_loudness")],
    },
    Builtin {
        name: "sensor.light", description: "Ambient light level 0-100",
        signatures: &[sig!([], Some(Number), "robot_lightlevel")],
    },
    Builtin {
        name: "sensor.color", description: "Name of the color under the color sensor",
        signatures: &[sig!([], Some(String), "robot_colordetected")],
    },
    Builtin {
        name: "audio.volume", description: "Speaker volume 0-100",
        signatures: &[sig!([], Some(Number), "sound_volume")],
    },
    Builtin {
        name: "drive.speed", description: "Drive base speed in percent",
        signatures: &[sig!([], Some(Number), "robot_drivespeed")],
    },
    Builtin {
        name: "display.brightness", description: "LED matrix brightness 0-100",
        signatures: &[sig!([], Some(Number), "robot_displaybrightness")],
    },
];

/// Writable builtin properties.
pub static ASSIGNMENTS: &[AssignTarget] = &[
    AssignTarget {
        name: "audio.volume", ty: Number, description: "Speaker volume 0-100",
        set: sig!([input("volume", Number, "VOLUME")], None, "sound_setvolumeto"),
        change: &[sig!([input("volume", Number, "VOLUME")], None, "sound_changevolumeby")],
    },
    AssignTarget {
        name: "audio.pitch", ty: Number, description: "Pitch effect applied to sounds",
        set: sig!([input("pitch", Number, "VALUE")], None, "sound_seteffectto", [("EFFECT", "PITCH")]),
        change: &[
            sig!([input("pitch", Number, "VALUE")], None, "sound_changeeffectby", [("EFFECT", "PITCH")]),
        ],
    },
    AssignTarget {
        name: "drive.speed", ty: Number, description: "Drive base speed in percent",
        set: sig!([input("speed", Number, "SPEED")], None, "robot_setdrivespeed"),
        change: &[],
    },
    AssignTarget {
        name: "display.brightness", ty: Number, description: "LED matrix brightness 0-100",
        set: sig!([input("brightness", Number, "BRIGHTNESS")], None, "robot_setbrightness"),
        change: &[sig!([input("brightness", Number, "BRIGHTNESS")], None, "robot_changebrightnessby")],
    },
];

/// Statement blocks (no return value).
pub static STATEMENTS: &[Builtin] = &[
    // ── Audio ───────────────────────────────────────────────────
    Builtin {
        name: "audio.playBuzzer", description: "Play a tone on the buzzer",
        signatures: &[
            sig!([input("freq", Number, "FREQUENCY")], None, "robot_playtone"),
            sig!(
                [input("freq", Number, "FREQUENCY"), input("seconds", Number, "DURATION")],
                None,
                "robot_playtonefor",
            ),
        ],
    },
    Builtin {
        name: "audio.playSound", description: "Start playing a sound",
        signatures: &[sig!([menu("sound", "SOUND_MENU", "sound_sounds_menu", "SOUND_MENU", None)], None, "sound_play")],
    },
    Builtin {
        name: "audio.playSoundUntilDone", description: "Play a sound and wait for it to finish",
        signatures: &[sig!(
            [menu("sound", "SOUND_MENU", "sound_sounds_menu", "SOUND_MENU", None)],
            None,
            "sound_playuntildone",
        )],
    },
    Builtin {
        name: "audio.stop", description: "Stop all sounds",
        signatures: &[sig!([], None, "sound_stopallsounds")],
    },
    // ── Motors & drive ──────────────────────────────────────────
    Builtin {
        name: "motors.run", description: "Run a motor at a speed, optionally for a time",
        signatures: &[
            sig!(
                [menu("port", "PORT", "robot_menu_port", "PORT", Some(PORTS)), input("speed", Number, "SPEED")],
                None,
                "robot_motorrun",
            ),
            sig!(
                [
                    menu("port", "PORT", "robot_menu_port", "PORT", Some(PORTS)),
                    input("speed", Number, "SPEED"),
                    input("seconds", Number, "DURATION"),
                ],
                None,
                "robot_motorrunfor",
            ),
        ],
    },
    Builtin {
        name: "motors.stop", description: "Stop a motor",
        signatures: &[sig!([menu("port", "PORT", "robot_menu_port", "PORT", Some(PORTS))], None, "robot_motorstop")],
    },
    Builtin {
        name: "drive.move", description: "Drive forward (negative: backward) a distance in cm",
        signatures: &[sig!([input("distance", Number, "DISTANCE")], None, "robot_drivemove")],
    },
    Builtin {
        name: "drive.turn", description: "Turn in place by degrees (positive: clockwise)",
        signatures: &[sig!([input("degrees", Number, "DEGREES")], None, "robot_driveturn")],
    },
    Builtin {
        name: "drive.stop", description: "Stop the drive base",
        signatures: &[sig!([], None, "robot_drivestop")],
    },
    // ── Display & lights ────────────────────────────────────────
    Builtin {
        name: "display.show", description: "Show text, a number or an image on the LED matrix",
        signatures: &[
            sig!([input("text", String, "TEXT")], None, "robot_displaytext"),
            sig!([input("value", Number, "TEXT")], None, "robot_displaytext"),
            sig!([input("picture", Image, "MATRIX")], None, "robot_displayimage"),
        ],
    },
    Builtin {
        name: "display.pixel", description: "Light one pixel of the LED matrix",
        signatures: &[sig!(
            [input("x", Number, "X"), input("y", Number, "Y"), field("color", "COLOR", COLORS)],
            None,
            "robot_setpixel",
        )],
    },
    Builtin {
        name: "display.clear", description: "Turn off every pixel",
        signatures: &[sig!([], None, "robot_displayclear")],
    },
    Builtin {
        name: "lights.setColor", description: "Set the status light color",
        signatures: &[sig!(
            [menu("color", "COLOR", "robot_menu_color", "COLOR", Some(COLORS))],
            None,
            "robot_setlightcolor",
        )],
    },
    Builtin {
        name: "lights.off", description: "Turn the status light off",
        signatures: &[sig!([], None, "robot_lightsoff")],
    },
    // ── Flow ────────────────────────────────────────────────────
    Builtin {
        name: "flow.wait", description: "Wait a number of seconds",
        signatures: &[sig!([input("seconds", Number, "DURATION")], None, "control_wait")],
    },
    Builtin {
        name: "flow.waitUntil", description: "Wait until a condition is true",
        signatures: &[sig!([input("condition", Boolean, "CONDITION")], None, "control_wait_until")],
    },
    Builtin {
        name: "flow.stop", description: "Stop the whole program",
        signatures: &[sig!([], None, "control_stop", [("STOP_OPTION", "all")], true)],
    },
    Builtin {
        name: "flow.stopThis", description: "Stop this script",
        signatures: &[sig!([], None, "control_stop", [("STOP_OPTION", "this script")], true)],
    },
    Builtin {
        name: "timer.reset", description: "Reset the timer to zero",
        signatures: &[sig!([], None, "sensing_resettimer")],
    },
    // ── Lists ───────────────────────────────────────────────────
    Builtin {
        name: "list.add", description: "Append an item",
        signatures: &[
            sig!([list("list", NumberList), input("item", Number, "ITEM")], None, "data_addtolist"),
            sig!([list("list", StringList), input("item", String, "ITEM")], None, "data_addtolist"),
        ],
    },
    Builtin {
        name: "list.remove", description: "Delete the item at a 1-based index",
        signatures: &[
            sig!([list("list", NumberList), input("index", Number, "INDEX")], None, "data_deleteoflist"),
            sig!([list("list", StringList), input("index", Number, "INDEX")], None, "data_deleteoflist"),
        ],
    },
    Builtin {
        name: "list.clear", description: "Delete every item",
        signatures: &[
            sig!([list("list", NumberList)], None, "data_deletealloflist"),
            sig!([list("list", StringList)], None, "data_deletealloflist"),
        ],
    },
    Builtin {
        name: "list.insert", description: "Insert an item at a 1-based index",
        signatures: &[
            sig!(
                [list("list", NumberList), input("index", Number, "INDEX"), input("item", Number, "ITEM")],
                None,
                "data_insertatlist",
            ),
            sig!(
                [list("list", StringList), input("index", Number, "INDEX"), input("item", String, "ITEM")],
                None,
                "data_insertatlist",
            ),
        ],
    },
    Builtin {
        name: "list.replace", description: "Replace the item at a 1-based index",
        signatures: &[
            sig!(
                [list("list", NumberList), input("index", Number, "INDEX"), input("item", Number, "ITEM")],
                None,
                "data_replaceitemoflist",
            ),
            sig!(
                [list("list", StringList), input("index", Number, "INDEX"), input("item", String, "ITEM")],
                None,
                "data_replaceitemoflist",
            ),
        ],
    },
];

/// Reporter blocks (return a value).
pub static FUNCTIONS: &[Builtin] = &[
    // ── Math ────────────────────────────────────────────────────
    Builtin {
        name: "math.abs", description: "Absolute value",
        signatures: &[sig!([input("x", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "abs")])],
    },
    Builtin {
        name: "math.floor", description: "Round down",
        signatures: &[sig!([input("x", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "floor")])],
    },
    Builtin {
        name: "math.ceil", description: "Round up",
        signatures: &[sig!([input("x", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "ceiling")])],
    },
    Builtin {
        name: "math.sqrt", description: "Square root",
        signatures: &[sig!([input("x", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "sqrt")])],
    },
    Builtin {
        name: "math.sin", description: "Sine of an angle in degrees",
        signatures: &[sig!([input("degrees", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "sin")])],
    },
    Builtin {
        name: "math.cos", description: "Cosine of an angle in degrees",
        signatures: &[sig!([input("degrees", Number, "NUM")], Some(Number), "operator_mathop", [("OPERATOR", "cos")])],
    },
    Builtin {
        name: "math.round", description: "Round to nearest integer",
        signatures: &[sig!([input("x", Number, "NUM")], Some(Number), "operator_round")],
    },
    Builtin {
        name: "math.random", description: "Random number between two bounds",
        signatures: &[sig!([input("from", Number, "FROM"), input("to", Number, "TO")], Some(Number), "operator_random")],
    },
    // ── Text ────────────────────────────────────────────────────
    Builtin {
        name: "text.length", description: "Number of characters",
        signatures: &[sig!([input("text", String, "STRING")], Some(Number), "operator_length")],
    },
    Builtin {
        name: "text.letter", description: "Character at a 1-based index",
        signatures: &[sig!(
            [input("text", String, "STRING"), input("index", Number, "LETTER")],
            Some(String),
            "operator_letter_of",
        )],
    },
    Builtin {
        name: "text.contains", description: "Whether text contains a part (case-insensitive)",
        signatures: &[sig!(
            [input("text", String, "STRING1"), input("part", String, "STRING2")],
            Some(Boolean),
            "operator_contains",
        )],
    },
    // ── Lists ───────────────────────────────────────────────────
    Builtin {
        name: "list.length", description: "Number of items",
        signatures: &[
            sig!([list("list", NumberList)], Some(Number), "data_lengthoflist"),
            sig!([list("list", StringList)], Some(Number), "data_lengthoflist"),
        ],
    },
    Builtin {
        name: "list.item", description: "Item at a 1-based index",
        signatures: &[
            sig!([list("list", NumberList), input("index", Number, "INDEX")], Some(Number), "data_itemoflist"),
            sig!([list("list", StringList), input("index", Number, "INDEX")], Some(String), "data_itemoflist"),
        ],
    },
    Builtin {
        name: "list.contains", description: "Whether the list holds an item",
        signatures: &[
            sig!([list("list", NumberList), input("item", Number, "ITEM")], Some(Boolean), "data_listcontainsitem"),
            sig!([list("list", StringList), input("item", String, "ITEM")], Some(Boolean), "data_listcontainsitem"),
        ],
    },
    Builtin {
        name: "list.indexOf", description: "1-based index of an item, 0 if absent",
        signatures: &[
            sig!([list("list", NumberList), input("item", Number, "ITEM")], Some(Number), "data_itemnumoflist"),
            sig!([list("list", StringList), input("item", String, "ITEM")], Some(Number), "data_itemnumoflist"),
        ],
    },
    // ── Sensors ─────────────────────────────────────────────────
    Builtin {
        name: "sensor.isPressed", description: "Whether a hub button is held down",
        signatures: &[sig!(
            [menu("button", "BUTTON", "robot_menu_button", "BUTTON", Some(BUTTONS))],
            Some(Boolean),
            "robot_buttonpressed",
        )],
    },
    Builtin {
        name: "sensor.seesColor", description: "Whether the color sensor sees a color",
        signatures: &[sig!([field("color", "COLOR", COLORS)], Some(Boolean), "robot_seescolor")],
    },
    Builtin {
        name: "motors.position", description: "Motor position in degrees",
        signatures: &[sig!(
            [menu("port", "PORT", "robot_menu_port", "PORT", Some(PORTS))],
            Some(Number),
            "robot_motorposition",
        )],
    },
];
