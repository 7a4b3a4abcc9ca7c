mod bootstrap;
mod connector;
mod reconciler;
