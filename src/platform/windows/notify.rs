//! Toast notifications through the WinRT notification API, driven from
//! PowerShell so no extra crate features are needed.

use crate::utils::hidden_command;

const APP_ID: &str = "PortAssassin";

pub fn show(title: &str, body: &str) {
    let script = toast_script(title, body);
    if let Err(err) = hidden_command("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .spawn()
    {
        log::debug!("toast not shown: {}", err);
    }
}

fn toast_script(title: &str, body: &str) -> String {
    let xml = format!(
        "<toast><visual><binding template=\"ToastGeneric\"><text>{}</text><text>{}</text></binding></visual></toast>",
        xml_escape(title),
        xml_escape(body)
    );
    [
        "$ErrorActionPreference = 'SilentlyContinue'",
        "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null",
        "$doc = New-Object Windows.Data.Xml.Dom.XmlDocument",
        format!("$doc.LoadXml('{}')", ps_quote(&xml)).as_str(),
        format!(
            "[Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{}').Show([Windows.UI.Notifications.ToastNotification]::new($doc))",
            APP_ID
        )
        .as_str(),
    ]
    .join("; ")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// Single-quoted PowerShell strings only treat `'` specially.
fn ps_quote(s: &str) -> String {
    s.replace('\'', "''")
}
