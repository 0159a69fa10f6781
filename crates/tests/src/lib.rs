
#[cfg(test)]
mod call_tests;
#[cfg(test)]
mod chat_tests;
#[cfg(test)]
mod message_tests;
#[cfg(test)]
mod ws_tests;
