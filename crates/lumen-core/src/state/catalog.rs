//! Static subnode and field catalog
//!
//! Field schemas are global configuration, never stored per session. The
//! state manager consults them to validate `update_field` and to resolve
//! labels and icons when a subnode is confirmed.

use super::model::{Category, FieldValue, HexColor, SubnodeValues};

/// Declared kind of an input field, with its constraints
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Slider { min: f64, max: f64, step: f64 },
    Dropdown(&'static [&'static str]),
    Toggle,
    Color,
    KeyCombo,
}

/// Default value of a field in the catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Bool(bool),
    Number(f64),
    Text(&'static str),
}

impl FieldDefault {
    pub fn to_value(self) -> FieldValue {
        match self {
            Self::Bool(value) => FieldValue::Bool(value),
            Self::Number(value) => FieldValue::Number(value),
            Self::Text(value) => FieldValue::from(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub unit: Option<&'static str>,
    pub placeholder: Option<&'static str>,
}

impl FieldSpec {
    /// Check a value against this field's declared kind
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (&self.kind, value) {
            (FieldKind::Slider { min, max, .. }, FieldValue::Number(n)) => *n >= *min && *n <= *max,
            (FieldKind::Slider { .. }, _) => false,
            (FieldKind::Toggle, FieldValue::Bool(_)) => true,
            (FieldKind::Toggle, _) => false,
            (FieldKind::Color, FieldValue::Color(_)) => true,
            (FieldKind::Color, FieldValue::Text(text)) => is_hex_color(text),
            (FieldKind::Color, _) => false,
            (FieldKind::Dropdown(options), value) => match value.as_str() {
                Some(text) => options.is_empty() || options.contains(&text),
                None => options.is_empty(),
            },
            (FieldKind::Text | FieldKind::KeyCombo, _) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubnodeSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub fields: &'static [FieldSpec],
}

impl SubnodeSpec {
    pub fn field(&self, field_id: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.id == field_id)
    }

    /// Catalog defaults for every field of this subnode
    pub fn default_values(&self) -> SubnodeValues {
        self.fields
            .iter()
            .map(|field| (field.id.to_string(), field.default.to_value()))
            .collect()
    }
}

/// `#RRGGBB`
pub fn is_hex_color(text: &str) -> bool {
    HexColor::is_valid(text)
}

/// Subnodes declared for a category
pub fn subnodes(category: Category) -> &'static [SubnodeSpec] {
    match category {
        Category::Voice => VOICE,
        Category::Agent => AGENT,
        Category::Automate => AUTOMATE,
        Category::System => SYSTEM,
        Category::Customize => CUSTOMIZE,
        Category::Monitor => MONITOR,
    }
}

pub fn subnode(category: Category, subnode_id: &str) -> Option<&'static SubnodeSpec> {
    subnodes(category).iter().find(|spec| spec.id == subnode_id)
}

/// Category owning a subnode id
pub fn category_of(subnode_id: &str) -> Option<Category> {
    Category::ALL
        .into_iter()
        .find(|category| subnode(*category, subnode_id).is_some())
}

pub fn find_subnode(subnode_id: &str) -> Option<&'static SubnodeSpec> {
    category_of(subnode_id).and_then(|category| subnode(category, subnode_id))
}

pub fn field_spec(subnode_id: &str, field_id: &str) -> Option<&'static FieldSpec> {
    find_subnode(subnode_id)?.field(field_id)
}

/// Validate a value for `update_field`.
///
/// Unknown subnodes and unknown fields are accepted without validation.
pub fn validate_field_value(subnode_id: &str, field_id: &str, value: &FieldValue) -> bool {
    field_spec(subnode_id, field_id).is_none_or(|spec| spec.accepts(value))
}

const fn text(id: &'static str, label: &'static str, placeholder: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::Text,
        default: FieldDefault::Text(default),
        unit: None,
        placeholder: Some(placeholder),
    }
}

const fn slider(
    id: &'static str,
    label: &'static str,
    range: (f64, f64, f64),
    default: f64,
    unit: Option<&'static str>,
) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::Slider {
            min: range.0,
            max: range.1,
            step: range.2,
        },
        default: FieldDefault::Number(default),
        unit,
        placeholder: None,
    }
}

const fn dropdown(
    id: &'static str,
    label: &'static str,
    options: &'static [&'static str],
    default: &'static str,
) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::Dropdown(options),
        default: FieldDefault::Text(default),
        unit: None,
        placeholder: None,
    }
}

const fn toggle(id: &'static str, label: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::Toggle,
        default: FieldDefault::Bool(default),
        unit: None,
        placeholder: None,
    }
}

const fn color(id: &'static str, label: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::Color,
        default: FieldDefault::Text(default),
        unit: None,
        placeholder: None,
    }
}

const fn key_combo(id: &'static str, label: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        label,
        kind: FieldKind::KeyCombo,
        default: FieldDefault::Text(default),
        unit: None,
        placeholder: Some(default),
    }
}

const PERCENT: Option<&str> = Some("%");
const SECONDS: Option<&str> = Some("s");

static VOICE: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "input",
        label: "INPUT",
        icon: "Mic",
        fields: &[
            dropdown("input_device", "Input Device", &["Default", "USB Microphone", "Headset", "Webcam"], "Default"),
            slider("input_sensitivity", "Input Sensitivity", (0.0, 100.0, 1.0), 50.0, PERCENT),
            toggle("noise_gate", "Noise Gate", false),
            toggle("vad", "VAD", true),
            text("input_test", "Input Test", "Test microphone", ""),
        ],
    },
    SubnodeSpec {
        id: "output",
        label: "OUTPUT",
        icon: "Volume2",
        fields: &[
            dropdown("output_device", "Output Device", &["Default", "Headphones", "Speakers", "HDMI"], "Default"),
            slider("master_volume", "Master Volume", (0.0, 100.0, 1.0), 70.0, PERCENT),
            text("output_test", "Output Test", "Test audio", ""),
            slider("latency_compensation", "Latency Compensation", (0.0, 500.0, 1.0), 0.0, Some("ms")),
        ],
    },
    SubnodeSpec {
        id: "processing",
        label: "PROCESSING",
        icon: "AudioWaveform",
        fields: &[
            toggle("noise_reduction", "Noise Reduction", true),
            toggle("echo_cancellation", "Echo Cancellation", true),
            toggle("voice_enhancement", "Voice Enhancement", false),
            toggle("automatic_gain", "Automatic Gain", true),
        ],
    },
    SubnodeSpec {
        id: "model",
        label: "MODEL",
        icon: "Cpu",
        fields: &[
            text("endpoint", "LFM Endpoint", "http://localhost:1234", "http://localhost:1234"),
            text("connection_test", "Connection Test", "Test connection", ""),
            slider("temperature", "Temperature", (0.0, 2.0, 0.1), 0.7, None),
            slider("max_tokens", "Max Tokens", (256.0, 8192.0, 256.0), 2048.0, None),
            slider("context_window", "Context Window", (1024.0, 32768.0, 1024.0), 8192.0, None),
        ],
    },
];

static AGENT: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "identity",
        label: "IDENTITY",
        icon: "Smile",
        fields: &[
            text("assistant_name", "Assistant Name", "IRIS", "IRIS"),
            dropdown("personality", "Personality", &["Professional", "Friendly", "Concise", "Creative", "Technical"], "Friendly"),
            dropdown("knowledge", "Knowledge Focus", &["General", "Coding", "Writing", "Research", "Conversation"], "General"),
            dropdown("response_length", "Response Length", &["Brief", "Balanced", "Detailed", "Comprehensive"], "Balanced"),
        ],
    },
    SubnodeSpec {
        id: "wake",
        label: "WAKE",
        icon: "Sparkles",
        fields: &[
            dropdown("wake_phrase", "Wake Phrase", &["Hey Computer", "Jarvis", "Alexa", "Hey Mycroft", "Hey Jarvis"], "Hey Computer"),
            slider("detection_sensitivity", "Detection Sensitivity", (0.0, 100.0, 1.0), 70.0, PERCENT),
            toggle("activation_sound", "Activation Sound", true),
            slider("sleep_timeout", "Sleep Timeout", (5.0, 300.0, 1.0), 60.0, SECONDS),
        ],
    },
    SubnodeSpec {
        id: "speech",
        label: "SPEECH",
        icon: "MessageSquare",
        fields: &[
            dropdown("tts_voice", "TTS Voice", &["Nova", "Alloy", "Echo", "Fable", "Onyx", "Shimmer"], "Nova"),
            slider("speaking_rate", "Speaking Rate", (0.5, 2.0, 0.1), 1.0, Some("x")),
            slider("pitch_adjustment", "Pitch Adjustment", (-20.0, 20.0, 1.0), 0.0, Some("semitones")),
            slider("pause_duration", "Pause Duration", (0.0, 2.0, 0.1), 0.2, SECONDS),
            text("voice_cloning", "Voice Cloning", "Upload audio path", ""),
        ],
    },
    SubnodeSpec {
        id: "memory",
        label: "MEMORY",
        icon: "Database",
        fields: &[
            text("context_visualization", "Context Visualization", "View context", ""),
            text("token_count", "Token Count", "0 tokens", "0"),
            text("conversation_history", "Conversation History", "Browse history", ""),
            text("clear_memory", "Clear Memory", "Clear", ""),
            text("export_memory", "Export Memory", "Export", ""),
        ],
    },
];

static AUTOMATE: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "tools",
        label: "TOOLS",
        icon: "Wrench",
        fields: &[
            text("active_servers", "Active Servers", "Server status", ""),
            text("tool_browser", "Tool Browser", "Browse tools", ""),
            text("quick_actions", "Quick Actions", "Recent tools", ""),
            text("tool_categories", "Tool Categories", "Filter", ""),
        ],
    },
    SubnodeSpec {
        id: "workflows",
        label: "WORKFLOWS",
        icon: "Layers",
        fields: &[
            text("workflow_list", "Workflow List", "Saved workflows", ""),
            text("create_workflow", "Create Workflow", "Builder", ""),
            text("schedule", "Schedule", "Schedule", ""),
            text("conditions", "Conditions", "Conditions", ""),
        ],
    },
    SubnodeSpec {
        id: "favorites",
        label: "FAVORITES",
        icon: "Star",
        fields: &[
            text("favorite_commands", "Favorite Commands", "Pinned actions", ""),
            text("recent_actions", "Recent Actions", "Recent", ""),
            text("success_rate", "Success Rate", "0%", "0%"),
            text("edit_favorites", "Edit Favorites", "Edit", ""),
        ],
    },
    SubnodeSpec {
        id: "shortcuts",
        label: "SHORTCUTS",
        icon: "Keyboard",
        fields: &[
            key_combo("global_hotkey", "Global Hotkey", "Ctrl+Space"),
            text("voice_commands", "Voice Commands", "Map commands", ""),
            text("gesture_triggers", "Gesture Triggers", "Gestures", ""),
            key_combo("key_combinations", "Key Combinations", ""),
        ],
    },
    SubnodeSpec {
        id: "gui",
        label: "GUI AUTOMATION",
        icon: "Monitor",
        fields: &[
            dropdown("ui_tars_provider", "UI-TARS Provider", &["cli_npx", "native_python", "api_cloud"], "native_python"),
            dropdown("model_provider", "Vision Model", &["anthropic", "volcengine", "local"], "anthropic"),
            text("api_key", "API Key", "sk-...", ""),
            slider("max_steps", "Max Automation Steps", (5.0, 50.0, 1.0), 25.0, None),
            toggle("safety_confirmation", "Require Confirmation", true),
            toggle("debug_mode", "Debug Logging", true),
            text("test_automation", "Test Automation", "Run test task", ""),
        ],
    },
];

static SYSTEM: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "power",
        label: "POWER",
        icon: "Power",
        fields: &[
            text("shutdown", "Shutdown", "Shutdown", ""),
            text("restart", "Restart", "Restart", ""),
            text("sleep", "Sleep", "Sleep", ""),
            text("lock_screen", "Lock Screen", "Lock", ""),
            dropdown("power_profile", "Power Profile", &["Balanced", "Performance", "Battery"], "Balanced"),
            text("battery_status", "Battery Status", "Battery", ""),
        ],
    },
    SubnodeSpec {
        id: "display",
        label: "DISPLAY",
        icon: "Monitor",
        fields: &[
            slider("brightness", "Brightness", (0.0, 100.0, 1.0), 50.0, PERCENT),
            dropdown("resolution", "Resolution", &["Auto", "1920x1080", "2560x1440", "3840x2160"], "Auto"),
            toggle("night_mode", "Night Mode", false),
            text("multi_monitor", "Multi Monitor", "Arrange monitors", ""),
            dropdown("color_profile", "Color Profile", &["sRGB", "DCI-P3", "Adobe RGB"], "sRGB"),
        ],
    },
    SubnodeSpec {
        id: "storage",
        label: "STORAGE",
        icon: "HardDrive",
        fields: &[
            text("disk_usage", "Disk Usage", "Usage", ""),
            text("quick_folders", "Quick Folders", "Desktop/Downloads/Documents", ""),
            text("cleanup", "Cleanup", "Cleanup", ""),
            text("external_drives", "External Drives", "Drives", ""),
        ],
    },
    SubnodeSpec {
        id: "network",
        label: "NETWORK",
        icon: "Wifi",
        fields: &[
            toggle("wifi_toggle", "WiFi", true),
            text("ethernet_status", "Ethernet Status", "Connected", ""),
            dropdown("vpn_connection", "VPN Connection", &["None", "Work", "Personal"], "None"),
            text("bandwidth", "Bandwidth", "0 Mbps", ""),
            text("network_settings", "Network Settings", "Advanced", ""),
        ],
    },
];

static CUSTOMIZE: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "theme",
        label: "THEME",
        icon: "Palette",
        fields: &[
            dropdown("theme_mode", "Theme Mode", &["Dark", "Light", "Auto"], "Dark"),
            color("glow_color", "Glow Color", "#00ff88"),
            toggle("state_colors", "State Colors", false),
            color("idle_color", "Idle Color", "#00ff88"),
            color("listening_color", "Listening Color", "#00aaff"),
            color("processing_color", "Processing Color", "#a855f7"),
            color("error_color", "Error Color", "#ff3355"),
        ],
    },
    SubnodeSpec {
        id: "startup",
        label: "STARTUP",
        icon: "Power",
        fields: &[
            toggle("launch_startup", "Launch at Startup", false),
            dropdown("startup_behavior", "Startup Behavior", &["Show Widget", "Start Minimized", "Start Hidden"], "Show Widget"),
            toggle("welcome_message", "Welcome Message", true),
            dropdown("default_state", "Default State", &["Collapsed", "Expanded"], "Collapsed"),
        ],
    },
    SubnodeSpec {
        id: "behavior",
        label: "BEHAVIOR",
        icon: "Sliders",
        fields: &[
            toggle("confirm_destructive", "Confirm Destructive", true),
            slider("undo_history", "Undo History", (0.0, 50.0, 1.0), 10.0, Some("actions")),
            dropdown("error_notifications", "Error Notifications", &["Popup", "Banner", "Silent"], "Popup"),
            toggle("auto_save", "Auto Save", true),
        ],
    },
    SubnodeSpec {
        id: "notifications",
        label: "NOTIFICATIONS",
        icon: "Bell",
        fields: &[
            toggle("dnd_toggle", "Do Not Disturb", false),
            text("dnd_schedule", "DND Schedule", "Quiet hours", ""),
            dropdown("notification_sound", "Notification Sound", &["Default", "Chime", "Pulse", "Silent"], "Default"),
            dropdown("banner_style", "Banner Style", &["Native", "Custom", "Minimal"], "Native"),
            toggle("app_notifications", "App Notifications", true),
        ],
    },
];

static MONITOR: &[SubnodeSpec] = &[
    SubnodeSpec {
        id: "analytics",
        label: "ANALYTICS",
        icon: "BarChart3",
        fields: &[
            text("token_usage", "Token Usage", "Usage", ""),
            text("response_latency", "Response Latency", "Latency", ""),
            text("session_duration", "Session Duration", "Duration", ""),
            text("command_history", "Command History", "History", ""),
            text("cost_estimate", "Cost Estimate", "Cost", ""),
        ],
    },
    SubnodeSpec {
        id: "logs",
        label: "LOGS",
        icon: "FileText",
        fields: &[
            text("system_logs", "System Logs", "System", ""),
            text("voice_logs", "Voice Logs", "Voice", ""),
            text("mcp_logs", "MCP Logs", "MCP", ""),
            text("error_logs", "Error Logs", "Errors", ""),
            text("export_logs", "Export Logs", "Export", ""),
        ],
    },
    SubnodeSpec {
        id: "diagnostics",
        label: "DIAGNOSTICS",
        icon: "Stethoscope",
        fields: &[
            text("health_check", "Health Check", "Run", ""),
            text("lfm_benchmark", "LFM Benchmark", "Benchmark", ""),
            text("mcp_test", "MCP Test", "Test MCP", ""),
            text("network_test", "Network Test", "Test Network", ""),
            text("report_issue", "Report Issue", "Report", ""),
        ],
    },
    SubnodeSpec {
        id: "updates",
        label: "UPDATES",
        icon: "RefreshCw",
        fields: &[
            dropdown("update_channel", "Update Channel", &["Stable", "Beta", "Nightly"], "Stable"),
            text("check_updates", "Check Updates", "Check", ""),
            text("current_version", "Current Version", "v0.0.0", ""),
            text("changelog", "Changelog", "View", ""),
            toggle("auto_update", "Auto Update", true),
        ],
    },
];
